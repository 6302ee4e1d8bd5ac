use aws_config::Region;
use aws_sdk_bedrockagent as agents;
use aws_sdk_bedrockagentruntime as runtime;
use aws_sdk_iam as iam;
use aws_smithy_runtime::client::http::test_util::{ReplayEvent, StaticReplayClient};
use aws_smithy_runtime_api::http::{Request, Response, StatusCode};
use aws_smithy_types::body::SdkBody;
use bedrock_config::BedrockAgentsConfig;

use crate::BedrockAgentsClient;

pub(crate) const REGION: &str = "us-east-1";

/// A canned HTTP response, returned in order regardless of the request.
pub(crate) fn reply(status: u16, body: &str) -> ReplayEvent {
    ReplayEvent::new(
        Request::new(SdkBody::empty()),
        Response::new(
            StatusCode::try_from(status).unwrap(),
            SdkBody::from(body.to_string()),
        ),
    )
}

pub(crate) fn iam_error(code: &str) -> ReplayEvent {
    reply(
        404,
        &format!(
            "<ErrorResponse xmlns=\"https://iam.amazonaws.com/doc/2010-05-08/\">\
             <Error><Type>Sender</Type><Code>{code}</Code><Message>not found</Message></Error>\
             <RequestId>req-1</RequestId></ErrorResponse>"
        ),
    )
}

pub(crate) fn credentials() -> agents::config::Credentials {
    agents::config::Credentials::new("AKIDTEST", "secret", None, None, "test")
}

pub(crate) fn iam_client(http: StaticReplayClient) -> iam::Client {
    iam::Client::from_conf(
        iam::Config::builder()
            .behavior_version(iam::config::BehaviorVersion::latest())
            .region(Region::new(REGION))
            .credentials_provider(credentials())
            .http_client(http)
            .build(),
    )
}

/// Client whose control plane and IAM calls are answered from the given
/// replays. The runtime client has no responses.
pub(crate) fn client(agents_http: StaticReplayClient, iam_http: StaticReplayClient) -> BedrockAgentsClient {
    let mut config = BedrockAgentsConfig::default();
    config.aws.region = REGION.to_string();

    let agents = agents::Client::from_conf(
        agents::Config::builder()
            .behavior_version(agents::config::BehaviorVersion::latest())
            .region(Region::new(REGION))
            .credentials_provider(credentials())
            .http_client(agents_http)
            .build(),
    );
    let runtime = runtime::Client::from_conf(
        runtime::Config::builder()
            .behavior_version(runtime::config::BehaviorVersion::latest())
            .region(Region::new(REGION))
            .credentials_provider(credentials())
            .http_client(StaticReplayClient::new(Vec::new()))
            .build(),
    );

    BedrockAgentsClient::from_clients(agents, runtime, iam_client(iam_http), config)
}

/// Bodies of the requests a replay client has served, as text.
pub(crate) fn request_bodies(http: &StaticReplayClient) -> Vec<String> {
    http.actual_requests()
        .map(|request| {
            String::from_utf8_lossy(request.body().bytes().unwrap_or_default()).into_owned()
        })
        .collect()
}
