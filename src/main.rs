//! # API Boundary 演示服务
//!
//! 一个最小的用户服务，展示错误边界与审计日志的接线方式。

use api_boundary::{
    ApiError, BoundaryError, Classifier, ErrorBoundary, Result, ResultMetadataExt,
    api_error::{EnglishTranslator, FieldViolation, ValidationErrors},
    config::{self, AppConfig},
    logging,
    metadata::Value,
    middleware::AuditLogger,
    request_logger, response,
};
use axum::{
    Router, RequestExt,
    body::to_bytes,
    extract::{Path, Request},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::info;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Parser)]
#[command(name = "api-boundary", version, about = "请求边界演示服务")]
struct Args {
    /// 监听地址，覆盖配置文件
    #[arg(long)]
    bind: Option<String>,

    /// 配置文件路径，默认 config/config.{RUST_ENV}.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// 日志级别，`RUST_LOG` 优先
    #[arg(long)]
    log_level: Option<String>,

    /// 启用英文校验信息翻译
    #[arg(long)]
    translate: bool,

    /// 打印日志配置指南后退出
    #[arg(long)]
    logging_help: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.logging_help {
        logging::print_logging_help();
        return Ok(());
    }

    logging::init_logging(args.log_level.as_deref())?;

    let mut config = config::load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if args.translate {
        config.validation.translate = true;
    }

    let app = build_router(&config);
    let listener = TcpListener::bind(&config.server.bind_address)
        .await
        .map_err(|e| {
            BoundaryError::server_start_with_source(
                format!("绑定监听地址失败: {}", config.server.bind_address),
                e,
            )
        })?;

    info!(
        bind_address = %config.server.bind_address,
        audit_prefix = %config.audit.path_prefix,
        translate = config.validation.translate,
        "服务启动"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| BoundaryError::server_start_with_source("服务运行失败", e))?;

    info!("服务正常关闭");
    Ok(())
}

fn build_router(config: &AppConfig) -> Router {
    let classifier = if config.validation.translate {
        Classifier::with_translator(Arc::new(EnglishTranslator::new()))
    } else {
        Classifier::new()
    };
    let boundary = ErrorBoundary::new(classifier);
    let store = UserStore::default();

    let get_store = store.clone();
    let create_store = store;

    Router::new()
        .route(
            "/api/users/{id}",
            get(boundary.wrap(move |request: Request| {
                let store = get_store.clone();
                async move { get_user(store, request).await }
            })),
        )
        .route(
            "/api/users",
            post(boundary.wrap(move |request: Request| {
                let store = create_store.clone();
                async move { create_user(store, request).await }
            })),
        )
        .route("/api/slow", get(boundary.wrap(slow)))
        .route("/health", get(|| async { "ok" }))
        .layer(axum::middleware::from_fn_with_state(
            AuditLogger::new(config.audit.clone()),
            request_logger,
        ))
}

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u64,
    email: String,
    age: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateUser {
    email: String,
    age: u32,
}

impl CreateUser {
    /// 每个字段只报告第一条失败的规则
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.email.is_empty() {
            errors.push(FieldViolation::new("CreateUser.Email", "required"));
        } else if !self.email.contains('@') {
            errors.push(FieldViolation::new("CreateUser.Email", "email"));
        }

        if self.age == 0 {
            errors.push(FieldViolation::new("CreateUser.Age", "required"));
        } else if self.age < 18 {
            errors.push(FieldViolation::new("CreateUser.Age", "min").with_param("18"));
        }

        errors.into_result()
    }
}

#[derive(Debug, Clone, Default)]
struct UserStore {
    users: Arc<RwLock<HashMap<u64, User>>>,
    next_id: Arc<AtomicU64>,
}

async fn get_user(store: UserStore, mut request: Request) -> anyhow::Result<Response> {
    let Path(id) = request
        .extract_parts::<Path<u64>>()
        .await
        .map_err(|_| ApiError::bad_request("invalid user id"))?;

    let user = store.users.read().await.get(&id).cloned();
    match user {
        Some(user) => Ok(response::json(StatusCode::OK, &user)),
        None => Err(api_boundary::metadata!(ApiError::not_found("user not found"), "user_id", id)),
    }
}

async fn create_user(store: UserStore, request: Request) -> anyhow::Result<Response> {
    let body = to_bytes(request.into_body(), MAX_BODY_BYTES).await?;
    let payload: CreateUser = serde_json::from_slice(&body)
        .with_metadata([Value::from("body_bytes"), Value::from(body.len())])?;
    payload.validate()?;

    if store
        .users
        .read()
        .await
        .values()
        .any(|user| user.email == payload.email)
    {
        return Err(api_boundary::metadata!(
            ApiError::conflict("email already registered"),
            "email",
            payload.email
        ));
    }

    let id = store.next_id.fetch_add(1, Ordering::Relaxed) + 1;
    let user = User {
        id,
        email: payload.email,
        age: payload.age,
    };
    store.users.write().await.insert(id, user.clone());

    Ok(response::json(StatusCode::CREATED, &user))
}

/// 超过截止时间的上游调用
async fn slow(_request: Request) -> anyhow::Result<Response> {
    tokio::time::timeout(
        Duration::from_millis(50),
        tokio::time::sleep(Duration::from_millis(200)),
    )
    .await?;
    Ok(response::status(StatusCode::NO_CONTENT))
}
