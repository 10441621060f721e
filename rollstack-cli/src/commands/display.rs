//! Shared output helpers

use colored::*;
use rollstack_core::domain::deployment::DeploymentStatus;
use rollstack_core::domain::integration::IntegrationStatus;
use rollstack_core::domain::stack::StackStatus;

pub fn stack_status(status: StackStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        StackStatus::Deployed => text.green(),
        StackStatus::Pending
        | StackStatus::Deploying
        | StackStatus::Updating
        | StackStatus::Terminating => text.yellow(),
        StackStatus::FailedToDeploy
        | StackStatus::FailedToUpdate
        | StackStatus::FailedToTerminate => text.red(),
        StackStatus::Stopped | StackStatus::Terminated | StackStatus::Unknown => text.dimmed(),
    }
}

pub fn deployment_status(status: DeploymentStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        DeploymentStatus::Success => text.green(),
        DeploymentStatus::Pending | DeploymentStatus::InProgress => text.yellow(),
        DeploymentStatus::Failed => text.red(),
        DeploymentStatus::Stopped => text.dimmed(),
    }
}

pub fn integration_status(status: IntegrationStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        IntegrationStatus::Completed => text.green(),
        IntegrationStatus::Failed => text.red(),
        IntegrationStatus::Stopped | IntegrationStatus::Terminated => text.dimmed(),
        _ => text.yellow(),
    }
}

pub fn accepted(action: &str, id: uuid::Uuid) {
    println!("{} {} {}", "✓".green(), action, id.to_string().cyan());
}
