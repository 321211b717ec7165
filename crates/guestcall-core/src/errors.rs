use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// The guest conversation could not be provisioned; no session exists.
    #[error("chat provisioning failed: {0}")]
    Provision(String),
    /// The event stream dropped or failed at the transport level.
    #[error("event stream transport error: {0}")]
    Transport(String),
    /// The local customer left or was removed from the conversation.
    #[error("customer with member id {member_id} disconnected from conversation with id {conversation_id}")]
    CustomerDisconnected {
        conversation_id: String,
        member_id: String,
    },
}
