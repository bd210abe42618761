//! 리스 레코드
//!
//! 모든 복제본이 공유하는 저장소에 `{ name, holderIdentity, acquireTime,
//! renewTime, leaseDurationSeconds }` 형태로 기록됩니다.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// 리더 리스
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    /// 리스 이름
    pub name: String,
    /// 현재 보유자
    pub holder_identity: String,
    /// 현재 보유자가 처음 획득한 시각
    pub acquire_time: SystemTime,
    /// 마지막 갱신 시각
    pub renew_time: SystemTime,
    /// 유효 기간 (초)
    pub lease_duration_seconds: u64,
}

impl Lease {
    /// `now` 시각에 새로 획득한 리스
    pub fn acquire(
        name: impl Into<String>,
        holder_identity: impl Into<String>,
        lease_duration_seconds: u64,
        now: SystemTime,
    ) -> Self {
        Self {
            name: name.into(),
            holder_identity: holder_identity.into(),
            acquire_time: now,
            renew_time: now,
            lease_duration_seconds,
        }
    }

    /// `now` 시각으로 갱신한 리스 (획득 시각 유지)
    pub fn renewed(&self, now: SystemTime, lease_duration_seconds: u64) -> Self {
        Self {
            renew_time: now,
            lease_duration_seconds,
            ..self.clone()
        }
    }

    /// 만료 시각 (`renew_time + duration`). 표현할 수 없을 만큼 멀면 `None`.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.renew_time
            .checked_add(Duration::from_secs(self.lease_duration_seconds))
    }

    /// `now` 시각에 만료되었는지 여부
    ///
    /// 만료 시각이 범위를 벗어나는 리스는 만료되지 않은 것으로 봅니다.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at().is_some_and(|expires| now >= expires)
    }

    pub fn is_held_by(&self, identity: &str) -> bool {
        self.holder_identity == identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn lease_expires_after_duration_from_renewal() {
        let lease = Lease::acquire("sbomer-leader", "a", 15, at(100));
        assert!(!lease.is_expired_at(at(114)));
        assert!(lease.is_expired_at(at(115)));

        let renewed = lease.renewed(at(110), 15);
        assert_eq!(renewed.acquire_time, at(100));
        assert!(!renewed.is_expired_at(at(124)));
    }

    #[test]
    fn out_of_range_duration_never_expires() {
        let lease = Lease::acquire("sbomer-leader", "b", u64::MAX, at(100));
        assert_eq!(lease.expires_at(), None);
        assert!(!lease.is_expired_at(at(100)));
        assert!(!lease.is_expired_at(at(u64::from(u32::MAX))));
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let lease = Lease::acquire("sbomer-leader", "replica-0", 15, at(100));
        let json = serde_json::to_value(&lease).unwrap();
        assert_eq!(json["holderIdentity"], "replica-0");
        assert_eq!(json["leaseDurationSeconds"], 15);
        assert!(json.get("renewTime").is_some());
        assert!(json.get("acquireTime").is_some());
    }
}
