// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod router;

pub use router::*;

use anyhow::{Context, Result};
use astra::{Body, Request, Response, ResponseBuilder, Server};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;

/// Run the proxy until the process exits. Each worker thread shares the
/// context; the store sits behind a mutex inside it.
pub fn serve(addr: SocketAddr, ctx: ProxyContext) -> Result<()> {
    let ctx = Arc::new(ctx);
    eprintln!("hearth proxy listening on http://{addr}");

    Server::bind(&addr)
        .max_workers(8)
        .serve(move |req, _info| respond(req, &ctx))
        .context("run proxy server")
}

fn respond(mut req: Request, ctx: &ProxyContext) -> Response {
    let method = req.method().as_str().to_owned();
    let path = req.uri().path().to_owned();
    let query = req.uri().query().map(str::to_owned);

    let mut body = Vec::new();
    if let Err(error) = req.body_mut().reader().read_to_end(&mut body) {
        eprintln!("proxy: failed to read request body for {method} {path}: {error}");
        return to_response(ApiResponse::json_error(400, "failed to read request body"));
    }

    let api = dispatch(ctx, &method, &path, query.as_deref(), &body);
    if api.status >= 500 {
        eprintln!("proxy: {method} {path} -> {}", api.status);
    }
    to_response(api)
}

fn to_response(api: ApiResponse) -> Response {
    let mut builder = ResponseBuilder::new()
        .status(api.status)
        .header("Content-Type", api.content_type);
    if let Some(cache_control) = api.cache_control {
        builder = builder.header("Cache-Control", cache_control);
    }
    builder
        .body(Body::from(api.body))
        .unwrap_or_else(|_| Response::new(Body::from("internal server error")))
}
