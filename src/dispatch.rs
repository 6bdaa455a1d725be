//! Inbound message dispatch.
//!
//! The dispatcher is a pure reactive handler: the transport invokes it once
//! per delivered message, and it turns that message into the correct
//! side-effect. Requests resolve and run a local callable, then answer over
//! the wire; responses settle the correlation table. The engine neither
//! queues nor serializes inbound messages; whatever concurrency the
//! transport delivers is the concurrency the handlers see.

use serde_json::Value;

use crate::error::{Result, RpcError};
use crate::protocol::{Envelope, Request, Response};
use crate::rpc::RpcInner;

impl RpcInner {
    /// Handle one inbound transport payload.
    ///
    /// Errors escaping this function were not suppressed by any hook; the
    /// transport's delivery mechanism decides whether to keep running.
    pub(crate) async fn on_message(&self, data: Value) -> Result<()> {
        let envelope = match self
            .transport
            .deserialize(data)
            .and_then(Envelope::from_value)
        {
            Ok(envelope) => envelope,
            Err(error) => {
                if self.hook_general_error(&error, None, None) {
                    return Ok(());
                }
                return Err(error);
            }
        };

        match envelope {
            Envelope::Request(request) => self.handle_request(request).await,
            Envelope::Response(response) => {
                self.pending.settle(&response.i, response.r, response.e);
                Ok(())
            }
        }
    }

    /// Resolve, execute, and (for two-way calls) answer one request.
    async fn handle_request(&self, request: Request) -> Result<()> {
        let Request {
            i: id, m: method, a: args, ..
        } = request;

        // Resolution happens against the live table on every message, so
        // callables registered after construction are visible. The read
        // lock is released before the callable runs.
        let resolved = self.functions.read().resolve(&method);
        let resolved = match &self.config.resolver {
            Some(hook) => hook(&method, resolved),
            None => resolved,
        };

        let hook_args = args.clone();
        let outcome = match resolved {
            None => Err(RpcError::NotFound {
                method: method.clone(),
            }),
            Some(callable) => match callable.call(args).await {
                Ok(value) => Ok(value),
                Err(error) => Err(RpcError::Function {
                    method: method.clone(),
                    message: error.to_string(),
                }),
            },
        };

        let Some(id) = id else {
            // One-way event: nothing ever crosses back over the wire, but
            // local hooks still see the failure.
            if let Err(error) = outcome {
                let suppressed = self.hook_function_error(&error, &method, &hook_args);
                if !suppressed {
                    tracing::error!(method = %method, %error, "error in one-way call");
                }
            }
            return Ok(());
        };

        let error = match outcome {
            Ok(value) => {
                match self
                    .post_value_for(Response::ok(id.clone(), Some(value)), &method)
                    .await
                {
                    Ok(()) => return Ok(()),
                    // Fall back once to answering with an error so the
                    // caller is not left waiting for the full timeout.
                    Err(post_error) => {
                        tracing::warn!(
                            method = %method,
                            error = %post_error,
                            "success response failed to send, falling back to error response"
                        );
                        post_error
                    }
                }
            }
            Err(function_error) => {
                // The function-error hook gets first refusal; suppressing
                // means no response at all and the remote call times out.
                if self.hook_function_error(&function_error, &method, &hook_args) {
                    return Ok(());
                }
                function_error
            }
        };

        if let Err(post_error) = self
            .post_value_for(Response::err(id, error.to_wire_value()), &method)
            .await
        {
            if !self.hook_general_error(&post_error, Some(&method), Some(&hook_args)) {
                return Err(post_error);
            }
        }
        Ok(())
    }

    /// Encode and post one response envelope.
    async fn post_value_for(&self, response: Response, method: &str) -> Result<()> {
        let value = response.into_value().map_err(|e| {
            tracing::debug!(method = %method, error = %e, "response failed to encode");
            e
        })?;
        self.post_value(value).await
    }
}
