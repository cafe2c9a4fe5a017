//! Request/reply over zenoh queries
//!
//! A call is a `get` on the endpoint keyexpr carrying the serialized request. The first reply
//! decides the outcome:
//! - ok reply: payload is the serialized response
//! - error reply: payload is a UTF-8 reason, surfaced as [`MatchmakerError::Remote`]
//! - no reply before the timeout: [`MatchmakerError::Unreachable`]

use std::future::Future;
use std::time::Duration;

use zenoh::key_expr::KeyExpr;
use zenoh::query::Query;
use zenoh_ext::{z_deserialize, z_serialize, Deserialize, Serialize};

use crate::error::{MatchmakerError, Result};

/// Send `request` to `keyexpr` and decode the first reply
pub(crate) async fn call<Req, Resp>(
    session: &zenoh::Session,
    keyexpr: &KeyExpr<'static>,
    request: &Req,
    timeout: Duration,
) -> Result<Resp>
where
    Req: Serialize,
    Resp: Deserialize,
{
    let replies = session
        .get(keyexpr)
        .payload(z_serialize(request))
        .timeout(timeout)
        .await?;

    let reply = replies
        .recv_async()
        .await
        .map_err(|_| MatchmakerError::Unreachable(format!("No reply on '{}'", keyexpr)))?;

    match reply.result() {
        Ok(sample) => z_deserialize(sample.payload()).map_err(|e| {
            MatchmakerError::Serialization(format!("Failed to deserialize reply from '{}': {}", keyexpr, e))
        }),
        Err(err) => Err(MatchmakerError::Remote(
            err.payload()
                .try_to_string()
                .map(|reason| reason.into_owned())
                .unwrap_or_else(|_| format!("Undecodable error reply from '{}'", keyexpr)),
        )),
    }
}

/// Decode the request carried by `query`, run `handler` and reply with its response
///
/// Missing or malformed payloads get an error reply without calling `handler`.
pub(crate) async fn answer<Req, Resp, F, Fut>(query: &Query, handler: F) -> Result<()>
where
    Req: Deserialize,
    Resp: Serialize,
    F: FnOnce(Req) -> Fut,
    Fut: Future<Output = Resp>,
{
    let request = match query.payload().map(z_deserialize::<Req>) {
        Some(Ok(request)) => request,
        Some(Err(e)) => {
            tracing::debug!("Malformed request on '{}': {}", query.key_expr(), e);
            query.reply_err("Malformed request payload").await?;
            return Ok(());
        }
        None => {
            tracing::debug!("Request without payload on '{}'", query.key_expr());
            query.reply_err("Missing request payload").await?;
            return Ok(());
        }
    };

    let response = handler(request).await;
    query
        .reply(query.key_expr().clone(), z_serialize(&response))
        .await?;
    Ok(())
}
