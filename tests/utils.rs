use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::patch;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer as _;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

pub const MAIN_SHA: &str = "aa218f56b14c9653891f9e74264a383fa43fefbd";

pub fn setup_logging() -> anyhow::Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let format = tracing_subscriber::fmt::format().with_timer(timer);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let subscriber = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_test_writer()
        .with_filter(filter);
    tracing_subscriber::registry().with(subscriber).init();
    Ok(())
}

/// Whether the `curl` binary the GitHub client shells out to is installed.
pub fn curl_available() -> bool {
    std::process::Command::new("curl")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

#[derive(Debug, Clone)]
pub struct FakeFile {
    pub sha: String,
    pub content: Value,
}

#[derive(Debug, Clone)]
pub struct FakePr {
    pub number: u64,
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
}

/// In-memory stand-in for one GitHub repository.
#[derive(Debug, Default)]
pub struct FakeGithub {
    pub owner: String,
    pub branches: HashMap<String, String>,
    /// Keyed by (branch, path).
    pub files: HashMap<(String, String), FakeFile>,
    pub prs: Vec<FakePr>,
    /// Every request as `METHOD /path -> status`.
    pub calls: Vec<String>,
    /// Reject every file write with a 500.
    pub fail_writes: bool,
    next_blob: u64,
}

pub type SharedFake = Arc<Mutex<FakeGithub>>;

impl FakeGithub {
    pub fn new(owner: &str) -> SharedFake {
        let mut fake = FakeGithub {
            owner: owner.to_string(),
            ..Default::default()
        };
        fake.branches
            .insert("main".to_string(), MAIN_SHA.to_string());
        Arc::new(Mutex::new(fake))
    }
}

/// Serve `fake` on an ephemeral port and return its base URL.
pub async fn spawn_fake_github(fake: SharedFake) -> anyhow::Result<String> {
    let router = Router::new()
        .route("/repos/:owner/:repo/git/ref/*name", get(get_ref))
        .route(
            "/repos/:owner/:repo/git/refs",
            axum::routing::post(create_ref),
        )
        .route(
            "/repos/:owner/:repo/contents/*path",
            get(get_contents).put(put_contents),
        )
        .route("/repos/:owner/:repo/pulls", get(list_pulls).post(create_pull))
        .route("/repos/:owner/:repo/pulls/:number", patch(update_pull))
        .layer(axum::middleware::from_fn_with_state(fake.clone(), record))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, router).await });
    Ok(format!("http://{}", addr))
}

async fn record(State(fake): State<SharedFake>, request: Request, next: Next) -> Response {
    let line = format!("{} {}", request.method(), request.uri().path());
    let response = next.run(request).await;
    fake.lock()
        .unwrap()
        .calls
        .push(format!("{} -> {}", line, response.status().as_u16()));
    response
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))).into_response()
}

async fn get_ref(
    State(fake): State<SharedFake>,
    Path((_owner, _repo, name)): Path<(String, String, String)>,
) -> Response {
    let fake = fake.lock().unwrap();
    let Some(branch) = name.strip_prefix("heads/") else {
        return not_found();
    };
    match fake.branches.get(branch) {
        Some(sha) => Json(json!({
            "ref": format!("refs/{}", name),
            "object": {"sha": sha, "type": "commit"},
        }))
        .into_response(),
        None => not_found(),
    }
}

#[derive(Deserialize)]
struct CreateRefBody {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: String,
}

async fn create_ref(
    State(fake): State<SharedFake>,
    Json(body): Json<CreateRefBody>,
) -> Response {
    let mut fake = fake.lock().unwrap();
    let Some(branch) = body.ref_name.strip_prefix("refs/heads/") else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": "Reference name must start with refs/"})),
        )
            .into_response();
    };
    if fake.branches.contains_key(branch) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": "Reference already exists"})),
        )
            .into_response();
    }
    fake.branches.insert(branch.to_string(), body.sha.clone());
    (
        StatusCode::CREATED,
        Json(json!({"ref": body.ref_name, "object": {"sha": body.sha}})),
    )
        .into_response()
}

#[derive(Deserialize)]
struct RefQuery {
    #[serde(rename = "ref")]
    ref_name: Option<String>,
}

async fn get_contents(
    State(fake): State<SharedFake>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    Query(query): Query<RefQuery>,
) -> Response {
    let fake = fake.lock().unwrap();
    let branch = query.ref_name.unwrap_or_else(|| "main".to_string());
    match fake.files.get(&(branch, path.clone())) {
        Some(file) => Json(json!({"type": "file", "path": path, "sha": file.sha})).into_response(),
        None => not_found(),
    }
}

#[derive(Deserialize)]
struct PutContentsBody {
    #[allow(dead_code)]
    message: String,
    content: String,
    branch: String,
    sha: Option<String>,
}

async fn put_contents(
    State(fake): State<SharedFake>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    Json(body): Json<PutContentsBody>,
) -> Response {
    let mut fake = fake.lock().unwrap();
    if fake.fail_writes {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "Server Error"})),
        )
            .into_response();
    }
    let key = (body.branch.clone(), path.clone());
    let current = fake.files.get(&key).map(|file| file.sha.clone());
    match (&current, &body.sha) {
        (Some(_), None) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"message": "Invalid request.\n\n\"sha\" wasn't supplied."})),
            )
                .into_response();
        }
        (Some(current), Some(sent)) if current != sent => {
            return (
                StatusCode::CONFLICT,
                Json(json!({"message": format!("{} does not match {}", path, sent)})),
            )
                .into_response();
        }
        _ => {}
    }

    let Ok(bytes) = STANDARD.decode(&body.content) else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": "content is not valid Base64"})),
        )
            .into_response();
    };
    let Ok(content) = serde_json::from_slice(&bytes) else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": "content is not JSON"})),
        )
            .into_response();
    };

    fake.next_blob += 1;
    let sha = format!("blob{}", fake.next_blob);
    fake.files.insert(
        key,
        FakeFile {
            sha: sha.clone(),
            content,
        },
    );
    let status = if current.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, Json(json!({"content": {"path": path, "sha": sha}}))).into_response()
}

#[derive(Deserialize)]
struct PullsQuery {
    head: Option<String>,
    base: Option<String>,
}

fn pr_json(owner: &str, pr: &FakePr) -> Value {
    json!({
        "number": pr.number,
        "html_url": format!("https://github.com/{}/configs/pull/{}", owner, pr.number),
        "title": pr.title,
        "body": pr.body,
        "state": "open",
    })
}

async fn list_pulls(State(fake): State<SharedFake>, Query(query): Query<PullsQuery>) -> Response {
    let fake = fake.lock().unwrap();
    let prs: Vec<Value> = fake
        .prs
        .iter()
        .filter(|pr| {
            query
                .head
                .as_ref()
                .is_none_or(|head| *head == format!("{}:{}", fake.owner, pr.head))
        })
        .filter(|pr| query.base.as_ref().is_none_or(|base| *base == pr.base))
        .map(|pr| pr_json(&fake.owner, pr))
        .collect();
    Json(prs).into_response()
}

#[derive(Deserialize)]
struct CreatePullBody {
    title: String,
    head: String,
    base: String,
    body: String,
}

async fn create_pull(
    State(fake): State<SharedFake>,
    Json(body): Json<CreatePullBody>,
) -> Response {
    let mut fake = fake.lock().unwrap();
    let pr = FakePr {
        number: fake.prs.len() as u64 + 1,
        head: body.head,
        base: body.base,
        title: body.title,
        body: body.body,
    };
    let json = pr_json(&fake.owner, &pr);
    fake.prs.push(pr);
    (StatusCode::CREATED, Json(json)).into_response()
}

#[derive(Deserialize)]
struct UpdatePullBody {
    title: String,
    body: String,
}

async fn update_pull(
    State(fake): State<SharedFake>,
    Path((_owner, _repo, number)): Path<(String, String, u64)>,
    Json(body): Json<UpdatePullBody>,
) -> Response {
    let mut fake = fake.lock().unwrap();
    let owner = fake.owner.clone();
    let Some(pr) = fake.prs.iter_mut().find(|pr| pr.number == number) else {
        return not_found();
    };
    pr.title = body.title;
    pr.body = body.body;
    Json(pr_json(&owner, pr)).into_response()
}
