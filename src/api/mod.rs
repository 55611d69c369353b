//! HTTP gateway
//!
//! Thin warp front-end over the chain engine: balance and status queries,
//! Prometheus-style metrics, and transaction submission. Amounts cross
//! this boundary as coins (f64) and are converted to integer micros
//! immediately.

use crate::core::{coins_to_micros, micros_to_coins, ChainEngine, Transaction};
use crate::error::Result;
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::thread;
use warp::http::StatusCode;
use warp::{Filter, Reply};

const BODY_LIMIT_BYTES: u64 = 16 * 1024;

/// JSON body of `POST /tx`. Clients that pre-route and sign supply the
/// shard id, timestamp, and signature they signed over; anything else is
/// rejected at admission because the node never signs on a client's
/// behalf.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequest {
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    #[serde(default)]
    pub fee: f64,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub shard_id: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

fn with_engine(
    engine: Arc<ChainEngine>,
) -> impl Filter<Extract = (Arc<ChainEngine>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&engine))
}

/// The gateway's route tree; split out so tests can drive it without a
/// socket.
pub fn routes(
    engine: Arc<ChainEngine>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    let balance = warp::path("balance")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_engine(Arc::clone(&engine)))
        .map(|query: HashMap<String, String>, engine: Arc<ChainEngine>| {
            let address = query.get("address").cloned().unwrap_or_default();
            let shard = query.get("shard").cloned().unwrap_or_else(|| "0".to_string());
            let balance = micros_to_coins(engine.get_balance(&address, &shard));
            warp::reply::json(&json!({ "balance": balance, "shard": shard })).into_response()
        });

    let status = warp::path("status")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_engine(Arc::clone(&engine)))
        .map(|query: HashMap<String, String>, engine: Arc<ChainEngine>| {
            let shard = query.get("shard").cloned().unwrap_or_else(|| "0".to_string());
            engine.get_shard_status(&shard).into_response()
        });

    let metrics = warp::path("metrics")
        .and(warp::get())
        .and(with_engine(Arc::clone(&engine)))
        .map(|engine: Arc<ChainEngine>| render_metrics(&engine).into_response());

    let submit = warp::path("tx")
        .and(warp::post())
        .and(warp::body::content_length_limit(BODY_LIMIT_BYTES))
        .and(warp::body::json::<TxRequest>())
        .and(with_engine(engine))
        .map(|request: TxRequest, engine: Arc<ChainEngine>| {
            match queue_transaction(&engine, request) {
                Ok(fingerprint) => {
                    info!("Queued transaction {fingerprint}");
                    "Transaction queued".into_response()
                }
                Err(e) => {
                    warp::reply::with_status(e.to_string(), StatusCode::BAD_REQUEST)
                        .into_response()
                }
            }
        });

    balance.or(status).or(metrics).or(submit)
}

fn queue_transaction(engine: &ChainEngine, request: TxRequest) -> Result<String> {
    let amount = coins_to_micros(request.amount);
    let fee = coins_to_micros(request.fee);

    let mut tx = match request.timestamp {
        Some(ts) => Transaction::with_timestamp(
            &request.sender,
            &request.receiver,
            amount,
            fee,
            request.script,
            ts,
        )?,
        None => Transaction::new(&request.sender, &request.receiver, amount, fee, request.script)?,
    };
    if let Some(shard_id) = request.shard_id {
        tx.set_shard(&shard_id);
    }
    if let Some(signature) = request.signature {
        tx.set_signature(signature);
    }
    engine.submit_transaction(tx)
}

/// Prometheus text exposition: per-shard block counts plus the pool depth
/// and emission totals.
fn render_metrics(engine: &ChainEngine) -> String {
    let mut out = String::new();
    out.push_str("# TYPE blocks_total counter\n");
    for shard_id in engine.shard_ids() {
        out.push_str(&format!(
            "blocks_total{{shard=\"{}\"}} {}\n",
            shard_id,
            engine.block_count(&shard_id)
        ));
    }
    out.push_str("# TYPE pending_transactions gauge\n");
    out.push_str(&format!("pending_transactions {}\n", engine.pending_len()));
    out.push_str("# TYPE total_mined_micros counter\n");
    out.push_str(&format!("total_mined_micros {}\n", engine.total_mined()));
    out
}

/// Serve the gateway from a dedicated thread running a current-thread
/// tokio runtime, leaving the rest of the node fully synchronous.
pub fn serve(engine: Arc<ChainEngine>, port: u16) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to start API runtime: {e}");
                return;
            }
        };
        info!("API server running on port {port}");
        runtime.block_on(warp::serve(routes(engine)).run(([0, 0, 0, 0], port)));
    })
}
