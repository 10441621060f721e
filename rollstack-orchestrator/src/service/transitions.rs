//! Lifecycle preconditions of the stack operations

use rollstack_core::domain::stack::StackStatus;

use super::{ServiceError, ServiceResult};

pub const NOT_DEPLOYED: &str = "Stack is not deployed, yet. Please wait for it to finish";
pub const NOT_STOPPED: &str = "Stack is not stopped, yet. Please wait for it to finish";
pub const STILL_BUSY: &str =
    "The stacks is still deploying, updating or terminating, please wait for it to finish";

/// Stop is only accepted while deploying
pub fn check_stop(status: StackStatus) -> ServiceResult<()> {
    let message = match status {
        StackStatus::Deploying => return Ok(()),
        StackStatus::Deployed => {
            "Stack is already deployed, if you want to stop it, please use the terminate it"
        }
        StackStatus::Terminating => "Stack is terminating, please wait for it to finish",
        StackStatus::Terminated => "Stack is terminated, you cannot stop it",
        StackStatus::FailedToDeploy => "Stack failed to deploy, you cannot stop it",
        StackStatus::FailedToTerminate => "Stack failed to terminate, you cannot stop it",
        _ => "Stack is not deploying, yet. Please wait for it to finish",
    };
    Err(ServiceError::bad_request(message))
}

pub fn check_resume(status: StackStatus) -> ServiceResult<()> {
    if status.is_resumable() {
        Ok(())
    } else {
        Err(ServiceError::bad_request(NOT_STOPPED))
    }
}

/// A failed update may be retried
pub fn check_update_network(status: StackStatus) -> ServiceResult<()> {
    match status {
        StackStatus::Deployed | StackStatus::FailedToUpdate => Ok(()),
        _ => Err(ServiceError::bad_request(NOT_DEPLOYED)),
    }
}

pub fn check_terminate(status: StackStatus) -> ServiceResult<()> {
    if status.is_busy() || !status.can_transition_to(StackStatus::Terminating) {
        Err(ServiceError::bad_request(STILL_BUSY))
    } else {
        Ok(())
    }
}

/// Integrations are only installed on a deployed stack
pub fn check_install(status: StackStatus) -> ServiceResult<()> {
    if status == StackStatus::Deployed {
        Ok(())
    } else {
        Err(ServiceError::bad_request(NOT_DEPLOYED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_messages() {
        assert!(check_stop(StackStatus::Deploying).is_ok());
        assert_eq!(
            check_stop(StackStatus::Terminated).unwrap_err().to_string(),
            "Stack is terminated, you cannot stop it"
        );
        assert_eq!(
            check_stop(StackStatus::Pending).unwrap_err().to_string(),
            "Stack is not deploying, yet. Please wait for it to finish"
        );
        assert!(
            check_stop(StackStatus::Deployed)
                .unwrap_err()
                .to_string()
                .starts_with("Stack is already deployed")
        );
    }

    #[test]
    fn test_resume_only_from_resumable() {
        assert!(check_resume(StackStatus::Stopped).is_ok());
        assert!(check_resume(StackStatus::FailedToDeploy).is_ok());
        assert!(check_resume(StackStatus::Terminated).is_ok());
        assert_eq!(
            check_resume(StackStatus::Deployed).unwrap_err().to_string(),
            NOT_STOPPED
        );
    }

    #[test]
    fn test_terminate_rejected_while_busy() {
        for status in [
            StackStatus::Deploying,
            StackStatus::Updating,
            StackStatus::Terminating,
        ] {
            assert_eq!(check_terminate(status).unwrap_err().to_string(), STILL_BUSY);
        }
        assert!(check_terminate(StackStatus::Deployed).is_ok());
        assert!(check_terminate(StackStatus::FailedToTerminate).is_ok());
        assert!(check_terminate(StackStatus::Stopped).is_ok());
    }

    #[test]
    fn test_update_network_retry_allowed() {
        assert!(check_update_network(StackStatus::Deployed).is_ok());
        assert!(check_update_network(StackStatus::FailedToUpdate).is_ok());
        assert!(check_update_network(StackStatus::Pending).is_err());
    }
}
