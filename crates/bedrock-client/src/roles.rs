use aws_sdk_iam as iam;
use bedrock_core::{BedrockError, Result};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::classify;

const POLICY_NAME: &str = "BedrockAgentExecution";

pub(crate) fn trust_policy() -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "bedrock.amazonaws.com" },
            "Action": "sts:AssumeRole"
        }]
    })
}

/// Inline policy for an agent's execution role. Supervisors may also
/// resolve and invoke their collaborators' aliases.
pub(crate) fn execution_policy(region: &str, supervisor: bool) -> Value {
    let mut statements = vec![json!({
        "Sid": "InvokeFoundationModels",
        "Effect": "Allow",
        "Action": [
            "bedrock:InvokeModel",
            "bedrock:InvokeModelWithResponseStream",
            "bedrock:GetInferenceProfile",
            "bedrock:GetFoundationModel"
        ],
        "Resource": [
            "arn:aws:bedrock:*::foundation-model/*",
            "arn:aws:bedrock:*:*:inference-profile/*"
        ]
    })];

    if supervisor {
        statements.push(json!({
            "Sid": "InvokeCollaborators",
            "Effect": "Allow",
            "Action": ["bedrock:GetAgentAlias", "bedrock:InvokeAgent"],
            "Resource": [format!("arn:aws:bedrock:{region}:*:agent-alias/*")]
        }));
    }

    json!({
        "Version": "2012-10-17",
        "Statement": statements
    })
}

/// Return the ARN of `role_name`, creating the role when missing.
/// The flag tells whether the role was created by this call.
pub(crate) async fn ensure_role(
    client: &iam::Client,
    role_name: &str,
    region: &str,
    supervisor: bool,
) -> Result<(String, bool)> {
    let existing = match client.get_role().role_name(role_name).send().await {
        Ok(output) => output.role().map(|role| role.arn().to_string()),
        Err(e) => match classify("GetRole", e) {
            BedrockError::NotFound(_) => None,
            other => return Err(other),
        },
    };

    let (arn, created) = match existing {
        Some(arn) => {
            debug!("Reusing execution role {}", role_name);
            (arn, false)
        }
        None => {
            info!("Creating execution role {}", role_name);
            let output = client
                .create_role()
                .role_name(role_name)
                .assume_role_policy_document(trust_policy().to_string())
                .description("Execution role for an Amazon Bedrock agent")
                .send()
                .await
                .map_err(|e| classify("CreateRole", e))?;
            let arn = output
                .role()
                .map(|role| role.arn().to_string())
                .ok_or_else(|| BedrockError::ServiceError("CreateRole returned no role".into()))?;
            (arn, true)
        }
    };

    client
        .put_role_policy()
        .role_name(role_name)
        .policy_name(POLICY_NAME)
        .policy_document(execution_policy(region, supervisor).to_string())
        .send()
        .await
        .map_err(|e| classify("PutRolePolicy", e))?;

    Ok((arn, created))
}

/// Delete a role with its inline and attached policies. A missing role is
/// ignored.
pub(crate) async fn delete_role(client: &iam::Client, role_name: &str) -> Result<()> {
    let policies = match client.list_role_policies().role_name(role_name).send().await {
        Ok(output) => output.policy_names().to_vec(),
        Err(e) => match classify("ListRolePolicies", e) {
            BedrockError::NotFound(_) => {
                debug!("Role {} does not exist", role_name);
                return Ok(());
            }
            other => return Err(other),
        },
    };

    let attached = client
        .list_attached_role_policies()
        .role_name(role_name)
        .send()
        .await
        .map_err(|e| classify("ListAttachedRolePolicies", e))?;
    for policy_arn in attached
        .attached_policies()
        .iter()
        .filter_map(|policy| policy.policy_arn())
    {
        debug!("Detaching {} from {}", policy_arn, role_name);
        client
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| classify("DetachRolePolicy", e))?;
    }

    for policy in policies {
        client
            .delete_role_policy()
            .role_name(role_name)
            .policy_name(&policy)
            .send()
            .await
            .map_err(|e| classify("DeleteRolePolicy", e))?;
    }

    client
        .delete_role()
        .role_name(role_name)
        .send()
        .await
        .map_err(|e| classify("DeleteRole", e))?;

    Ok(())
}
