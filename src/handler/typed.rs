//! Callable trait and typed adapters.
//!
//! The engine calls every registered function through the object-safe
//! [`LocalHandler`] trait, which works on raw [`Value`] arguments. The
//! adapter constructors wrap plain async closures, deserializing positional
//! arguments into concrete types and serializing the return value back.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Boxed future returned by handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A callable registered in a [`FunctionTable`](super::FunctionTable).
///
/// Implementations must not assume anything about argument count; missing
/// positional arguments arrive as [`Value::Null`] through the typed
/// adapters.
pub trait LocalHandler: Send + Sync {
    /// Invoke the callable with raw positional arguments.
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, Result<Value>>;
}

/// Adapter over an async closure taking no arguments.
struct Handler0<F, Fut, R> {
    f: F,
    _marker: PhantomData<fn() -> (Fut, R)>,
}

impl<F, Fut, R> LocalHandler for Handler0<F, Fut, R>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Serialize + 'static,
{
    fn call(&self, _args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        let fut = (self.f)();
        Box::pin(async move {
            let value = fut.await?;
            Ok(serde_json::to_value(value)?)
        })
    }
}

/// Adapter over an async closure taking one deserialized argument.
struct Handler1<F, Fut, A, R> {
    f: F,
    _marker: PhantomData<fn(A) -> (Fut, R)>,
}

impl<F, Fut, A, R> LocalHandler for Handler1<F, Fut, A, R>
where
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R>> + Send + 'static,
    A: DeserializeOwned + Send,
    R: Serialize + 'static,
{
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        let mut args = args.into_iter();
        let a = match serde_json::from_value(args.next().unwrap_or(Value::Null)) {
            Ok(a) => a,
            Err(e) => return Box::pin(async move { Err(e.into()) }),
        };
        let fut = (self.f)(a);
        Box::pin(async move {
            let value = fut.await?;
            Ok(serde_json::to_value(value)?)
        })
    }
}

/// Adapter over an async closure taking two deserialized arguments.
struct Handler2<F, Fut, A, B, R> {
    f: F,
    _marker: PhantomData<fn(A, B) -> (Fut, R)>,
}

impl<F, Fut, A, B, R> LocalHandler for Handler2<F, Fut, A, B, R>
where
    F: Fn(A, B) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R>> + Send + 'static,
    A: DeserializeOwned + Send,
    B: DeserializeOwned + Send,
    R: Serialize + 'static,
{
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        let mut args = args.into_iter();
        let a = match serde_json::from_value(args.next().unwrap_or(Value::Null)) {
            Ok(a) => a,
            Err(e) => return Box::pin(async move { Err(e.into()) }),
        };
        let b = match serde_json::from_value(args.next().unwrap_or(Value::Null)) {
            Ok(b) => b,
            Err(e) => return Box::pin(async move { Err(e.into()) }),
        };
        let fut = (self.f)(a, b);
        Box::pin(async move {
            let value = fut.await?;
            Ok(serde_json::to_value(value)?)
        })
    }
}

/// Adapter passing raw argument values straight through.
struct RawHandler<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> LocalHandler for RawHandler<F, Fut>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        Box::pin((self.f)(args))
    }
}

/// Wrap a no-argument async closure as a handler.
pub fn handler0<F, Fut, R>(f: F) -> Arc<dyn LocalHandler>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Serialize + 'static,
{
    Arc::new(Handler0 {
        f,
        _marker: PhantomData,
    })
}

/// Wrap a one-argument async closure as a handler.
pub fn handler1<F, Fut, A, R>(f: F) -> Arc<dyn LocalHandler>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    A: DeserializeOwned + Send + 'static,
    R: Serialize + 'static,
{
    Arc::new(Handler1 {
        f,
        _marker: PhantomData,
    })
}

/// Wrap a two-argument async closure as a handler.
pub fn handler2<F, Fut, A, B, R>(f: F) -> Arc<dyn LocalHandler>
where
    F: Fn(A, B) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    A: DeserializeOwned + Send + 'static,
    B: DeserializeOwned + Send + 'static,
    R: Serialize + 'static,
{
    Arc::new(Handler2 {
        f,
        _marker: PhantomData,
    })
}

/// Wrap an async closure over raw argument values as a handler.
///
/// Use this when the callable wants the untyped argument list, needs a
/// variable arity, or should never complete (e.g. in timeout tests).
pub fn raw<F, Fut>(f: F) -> Arc<dyn LocalHandler>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(RawHandler {
        f,
        _marker: PhantomData,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_handler1_deserializes_argument() {
        let handler = handler1(|name: String| async move { Ok(format!("Hello {name}")) });
        let result = handler.call(vec![json!("X")]).await.unwrap();
        assert_eq!(result, json!("Hello X"));
    }

    #[tokio::test]
    async fn test_handler2_takes_positional_arguments() {
        let handler = handler2(|a: i64, b: i64| async move { Ok(a + b) });
        let result = handler.call(vec![json!(2), json!(3)]).await.unwrap();
        assert_eq!(result, json!(5));
    }

    #[tokio::test]
    async fn test_handler0_ignores_extra_arguments() {
        let handler = handler0(|| async { Ok(42) });
        let result = handler.call(vec![json!("ignored")]).await.unwrap();
        assert_eq!(result, json!(42));
    }

    #[tokio::test]
    async fn test_missing_argument_arrives_as_null() {
        let handler = handler1(|v: Option<i64>| async move { Ok(v.is_none()) });
        let result = handler.call(vec![]).await.unwrap();
        assert_eq!(result, json!(true));
    }

    #[tokio::test]
    async fn test_argument_type_mismatch_errors() {
        let handler = handler1(|n: i64| async move { Ok(n) });
        let err = handler.call(vec![json!("not a number")]).await.unwrap_err();
        assert!(matches!(err, crate::RpcError::Json(_)));
    }

    #[tokio::test]
    async fn test_raw_handler_sees_all_arguments() {
        let handler = raw(|args: Vec<Value>| async move { Ok(json!(args.len())) });
        let result = handler.call(vec![json!(1), json!(2), json!(3)]).await.unwrap();
        assert_eq!(result, json!(3));
    }
}
