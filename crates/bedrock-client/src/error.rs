use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use bedrock_core::BedrockError;
use std::error::Error;
use std::fmt::Debug;

/// Map an SDK failure onto the workspace error type by its service error code.
pub(crate) fn classify<E, R>(operation: &str, err: SdkError<E, R>) -> BedrockError
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    let code = err
        .as_service_error()
        .and_then(|e| e.code())
        .map(str::to_string);
    let message = format!("{operation}: {}", DisplayErrorContext(&err));

    from_code(code.as_deref(), message)
}

pub(crate) fn from_code(code: Option<&str>, message: String) -> BedrockError {
    match code {
        Some("ThrottlingException" | "Throttling" | "TooManyRequestsException") => {
            BedrockError::RateLimitError(message)
        }
        Some(
            "AccessDeniedException"
            | "AccessDenied"
            | "UnrecognizedClientException"
            | "ExpiredTokenException"
            | "ExpiredToken"
            | "InvalidClientTokenId",
        ) => BedrockError::AuthError(message),
        Some("ResourceNotFoundException" | "NoSuchEntity") => BedrockError::NotFound(message),
        Some("ConflictException" | "EntityAlreadyExists") => BedrockError::AlreadyExists(message),
        Some("ValidationException" | "ValidationError") => BedrockError::InvalidInput(message),
        _ => BedrockError::ServiceError(message),
    }
}
