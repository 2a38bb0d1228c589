use serde::{Deserialize, Serialize};

/// (記事, 種別) ごとのエンゲージメント状態機械。
///
/// Unknown → Off|On          初回の存在チェック
/// Off → PendingOn           トグル要求（楽観的に +1）
/// On → PendingOff           トグル要求（楽観的に -1）
/// PendingOn → On            バックエンド成功
/// PendingOff → Off          バックエンド成功
/// PendingOn → Off           バックエンド失敗（ロールバック）
/// PendingOff → On           バックエンド失敗（ロールバック）
///
/// Pending 中の再トグルは拒否され、キューイングもキャンセルもしない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementState {
    #[default]
    Unknown,
    Off,
    On,
    PendingOn,
    PendingOff,
}

impl EngagementState {
    pub fn primed(engaged: bool) -> Self {
        if engaged {
            EngagementState::On
        } else {
            EngagementState::Off
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, EngagementState::PendingOn | EngagementState::PendingOff)
    }

    /// 表示上「オン」として扱う状態か（楽観的更新を反映）
    pub fn displayed_on(&self) -> bool {
        matches!(self, EngagementState::On | EngagementState::PendingOn)
    }

    /// トグルを開始する。戻り値は (遷移先, カウントへの差分)。
    /// Pending 中・Unknown のトグルは None（呼び出し側で拒否する）。
    pub fn begin_toggle(self) -> Option<(EngagementState, i64)> {
        match self {
            EngagementState::Off => Some((EngagementState::PendingOn, 1)),
            EngagementState::On => Some((EngagementState::PendingOff, -1)),
            _ => None,
        }
    }

    /// バックエンド成功時の確定遷移。カウントは楽観値のままでよい。
    pub fn settle(self) -> EngagementState {
        match self {
            EngagementState::PendingOn => EngagementState::On,
            EngagementState::PendingOff => EngagementState::Off,
            other => other,
        }
    }

    /// バックエンド失敗時のロールバック遷移。
    /// カウントの復元は適用時の実値を覚えている呼び出し側が行う
    /// （差分の逆適用では飽和演算と往復しない）。
    pub fn roll_back(self) -> EngagementState {
        match self {
            EngagementState::PendingOn => EngagementState::Off,
            EngagementState::PendingOff => EngagementState::On,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_from_off_goes_pending_on_with_plus_one() {
        let (next, delta) = EngagementState::Off.begin_toggle().unwrap();
        assert_eq!(next, EngagementState::PendingOn);
        assert_eq!(delta, 1);
        assert!(next.displayed_on());
    }

    #[test]
    fn toggle_from_on_goes_pending_off_with_minus_one() {
        let (next, delta) = EngagementState::On.begin_toggle().unwrap();
        assert_eq!(next, EngagementState::PendingOff);
        assert_eq!(delta, -1);
        assert!(!next.displayed_on());
    }

    #[test]
    fn pending_states_reject_second_toggle() {
        assert!(EngagementState::PendingOn.begin_toggle().is_none());
        assert!(EngagementState::PendingOff.begin_toggle().is_none());
        assert!(EngagementState::Unknown.begin_toggle().is_none());
    }

    #[test]
    fn settle_confirms_pending_transitions() {
        assert_eq!(EngagementState::PendingOn.settle(), EngagementState::On);
        assert_eq!(EngagementState::PendingOff.settle(), EngagementState::Off);
        assert_eq!(EngagementState::Off.settle(), EngagementState::Off);
    }

    #[test]
    fn rollback_restores_pre_toggle_state() {
        assert_eq!(
            EngagementState::PendingOn.roll_back(),
            EngagementState::Off
        );
        assert_eq!(
            EngagementState::PendingOff.roll_back(),
            EngagementState::On
        );
        assert_eq!(EngagementState::On.roll_back(), EngagementState::On);
    }
}
