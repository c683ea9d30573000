//! `http`: blocking HTTP requests
//!
//! Backed by `reqwest` under the default `http` feature. A build with
//! default features disabled keeps the module on the surface but every call
//! fails at runtime. Responses are maps of the form `{status, ok, body, headers}`.

use serde_json::Value;

use crate::surface::{CallContext, NativeFunction, NativeModule, NativeResult};

/// Request timeout when the script does not pass one
#[cfg_attr(not(feature = "http"), allow(dead_code))]
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub fn module() -> NativeModule {
    NativeModule::new("http", "HTTP client")
        .with(NativeFunction::new("get", "get(url, headers, timeout_ms)", "GET a URL", 1, 3, get))
        .with(NativeFunction::new("post", "post(url, body, headers)", "POST a string or JSON body", 2, 3, post))
}

fn get(ctx: &CallContext<'_>, args: &[Value]) -> NativeResult {
    ctx.check_cancelled()?;
    imp::get(args)
}

fn post(ctx: &CallContext<'_>, args: &[Value]) -> NativeResult {
    ctx.check_cancelled()?;
    imp::post(args)
}

#[cfg(feature = "http")]
mod imp {
    use std::time::Duration;

    use reqwest::blocking::{Client, RequestBuilder, Response};
    use serde_json::{Map, Value};

    use super::DEFAULT_TIMEOUT_MS;
    use crate::modules::{arg, count_arg, str_arg};
    use crate::surface::{NativeError, NativeResult};
    use crate::value::display;

    fn client(timeout_ms: u64) -> Result<Client, NativeError> {
        Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(concat!("quarry-script/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NativeError::failure(format!("http: {}", e)))
    }

    fn with_headers(mut request: RequestBuilder, headers: &Value) -> RequestBuilder {
        if let Value::Object(headers) = headers {
            for (name, value) in headers {
                request = request.header(name.as_str(), display(value));
            }
        }
        request
    }

    fn into_value(function: &str, response: Response) -> NativeResult {
        let status = response.status();
        let mut headers = Map::new();
        for (name, value) in response.headers() {
            if let Ok(text) = value.to_str() {
                headers.insert(name.to_string(), Value::from(text));
            }
        }
        let body = response
            .text()
            .map_err(|e| NativeError::failure(format!("{}: {}", function, e)))?;

        let mut result = Map::new();
        result.insert("status".into(), Value::from(status.as_u16()));
        result.insert("ok".into(), Value::Bool(status.is_success()));
        result.insert("body".into(), Value::String(body));
        result.insert("headers".into(), Value::Object(headers));
        Ok(Value::Object(result))
    }

    pub(super) fn get(args: &[Value]) -> NativeResult {
        let url = str_arg("get", args, 0)?;
        let timeout = if args.len() > 2 {
            count_arg("get", args, 2)? as u64
        } else {
            DEFAULT_TIMEOUT_MS
        };
        let request = with_headers(client(timeout)?.get(url), arg(args, 1));
        let response = request
            .send()
            .map_err(|e| NativeError::failure(format!("get: {}", e)))?;
        into_value("get", response)
    }

    pub(super) fn post(args: &[Value]) -> NativeResult {
        let url = str_arg("post", args, 0)?;
        let request = client(DEFAULT_TIMEOUT_MS)?.post(url);
        let request = match arg(args, 1) {
            Value::String(body) => request.body(body.clone()),
            body => request.json(body),
        };
        let response = with_headers(request, arg(args, 2))
            .send()
            .map_err(|e| NativeError::failure(format!("post: {}", e)))?;
        into_value("post", response)
    }
}

#[cfg(not(feature = "http"))]
mod imp {
    use serde_json::Value;

    use crate::surface::{NativeError, NativeResult};

    fn disabled(function: &str) -> NativeResult {
        Err(NativeError::failure(format!(
            "{}: HTTP support is not enabled in this build",
            function
        )))
    }

    pub(super) fn get(_: &[Value]) -> NativeResult {
        disabled("get")
    }

    pub(super) fn post(_: &[Value]) -> NativeResult {
        disabled("post")
    }
}
