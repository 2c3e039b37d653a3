//! Lazy, state-only health check for cached service handles.

use crate::channel::ConnectivityState;
use crate::registry::ServiceClient;

/// Whether `handle` can still carry calls.
///
/// Reads the channel state without starting a connection attempt. Only a
/// shut-down channel is unusable; every other state reconnects on its own
/// on the next call.
#[must_use]
pub fn is_usable(handle: Option<&ServiceClient>) -> bool {
    handle.is_some_and(|h| h.channel().state() != ConnectivityState::Shutdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, Endpoint};
    use crate::registry::ServiceKind;

    fn handle() -> ServiceClient {
        let config = ClientConfig::default().with_endpoint(Endpoint::new("127.0.0.1", 1));
        ServiceClient::new(ServiceKind::Notes, &config)
    }

    #[test]
    fn test_absent_handle_is_unusable() {
        assert!(!is_usable(None));
    }

    #[test]
    fn test_non_shutdown_states_are_usable() {
        let h = handle();
        assert!(is_usable(Some(&h)));

        for state in [
            ConnectivityState::Connecting,
            ConnectivityState::Ready,
            ConnectivityState::TransientFailure,
            ConnectivityState::Idle,
        ] {
            h.channel().transition(state);
            assert!(is_usable(Some(&h)), "{state} should be usable");
        }
    }

    #[test]
    fn test_shutdown_is_unusable() {
        let h = handle();
        h.close();
        assert!(!is_usable(Some(&h)));
    }

    #[test]
    fn test_check_does_not_change_state() {
        let h = handle();
        assert!(is_usable(Some(&h)));
        assert!(is_usable(Some(&h)));
        assert_eq!(h.channel().state(), ConnectivityState::Idle);
    }
}
