use thiserror::Error;

use crate::membership::NodeState;
use crate::node::Endpoint;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum MembershipError {
    #[error("malformed message: expected at least {expected} bytes, received {received}")]
    MalformedMessage { expected: usize, received: usize },
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
    #[error("transport failed to send to {0}")]
    TransportSendFailure(Endpoint),
    #[error("refusing to apply a record about ourselves ({0})")]
    DuplicateSelfReference(Endpoint),
    #[error("refusing to resurrect expired member {0}")]
    StaleResurrection(Endpoint),
    #[error("expected node state {expected:?}, found {actual:?}")]
    InvalidState {
        expected: NodeState,
        actual: NodeState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn display() -> Result<(), Box<dyn std::error::Error>> {
        let test_malformed = MembershipError::MalformedMessage {
            expected: 15,
            received: 3,
        };

        assert_eq!(
            test_malformed.to_string().as_str(),
            "malformed message: expected at least 15 bytes, received 3",
        );
        assert_eq!(
            MembershipError::StaleResurrection(Endpoint::new(2, 0))
                .to_string()
                .as_str(),
            "refusing to resurrect expired member 0.0.0.2:0",
        );
        assert_eq!(
            MembershipError::InvalidState {
                expected: NodeState::Uninitialized,
                actual: NodeState::InGroup,
            }
            .to_string()
            .as_str(),
            "expected node state Uninitialized, found InGroup",
        );

        Ok(())
    }
}
