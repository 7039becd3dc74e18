// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! WebSocket endpoint for realtime event notifications.
//!
//! Clients authenticate via the `X-API-Key` header on the upgrade
//! request, then emit `{"type": "join-room", "room": "{org}:{project}"}`.
//! Joining is restricted to rooms inside the key's tenant scope. Once
//! joined, the connection receives `new_event` messages published by the
//! persistence worker.

use axum::{
	extract::{
		ws::{Message, WebSocket},
		State, WebSocketUpgrade,
	},
	response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pulse_server_auth::AuthContext;
use pulse_server_realtime::SUBSCRIBER_QUEUE_SIZE;

use crate::extract::Auth;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ClientMessage {
	#[serde(rename = "type")]
	msg_type: String,
	room: Option<String>,
}

/// GET /ws - upgrade to a realtime subscription connection.
pub async fn ws_upgrade_handler(
	ws: WebSocketUpgrade,
	State(state): State<AppState>,
	Auth(ctx): Auth,
) -> impl IntoResponse {
	info!(org_id = %ctx.org_id, "WebSocket upgrade request accepted");
	ws.on_upgrade(move |socket| handle_ws_connection(socket, state, ctx))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState, ctx: AuthContext) {
	let conn_id = Uuid::new_v4();
	let (mut sender, mut receiver) = socket.split();
	let (tx, mut rx) = mpsc::channel::<serde_json::Value>(SUBSCRIBER_QUEUE_SIZE);

	let send_task = tokio::spawn(async move {
		while let Some(message) = rx.recv().await {
			let Ok(text) = serde_json::to_string(&message) else {
				continue;
			};
			if let Err(e) = sender.send(Message::Text(text.into())).await {
				debug!(error = %e, "failed to send WebSocket message");
				break;
			}
		}
	});

	while let Some(message) = receiver.next().await {
		match message {
			Ok(Message::Text(text)) => {
				handle_client_message(&text, conn_id, &state, &ctx, &tx).await;
			}
			Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
			Ok(Message::Binary(_)) => {
				debug!(conn_id = %conn_id, "ignoring binary WebSocket message");
			}
			Ok(Message::Close(_)) => {
				info!(conn_id = %conn_id, "WebSocket close received");
				break;
			}
			Err(e) => {
				debug!(conn_id = %conn_id, error = %e, "WebSocket error");
				break;
			}
		}
	}

	state.bus.unsubscribe(conn_id).await;
	drop(tx);
	let _ = send_task.await;
	info!(conn_id = %conn_id, "WebSocket connection terminated");
}

async fn handle_client_message(
	text: &str,
	conn_id: Uuid,
	state: &AppState,
	ctx: &AuthContext,
	tx: &mpsc::Sender<serde_json::Value>,
) {
	let parsed: ClientMessage = match serde_json::from_str(text) {
		Ok(parsed) => parsed,
		Err(e) => {
			debug!(conn_id = %conn_id, error = %e, "invalid WebSocket message JSON");
			let _ = tx
				.send(json!({"type": "error", "message": "invalid message"}))
				.await;
			return;
		}
	};

	match parsed.msg_type.as_str() {
		"join-room" => {
			let Some(room) = parsed.room else {
				let _ = tx
					.send(json!({"type": "error", "message": "room is required"}))
					.await;
				return;
			};

			if !room_allowed(&room, ctx) {
				warn!(conn_id = %conn_id, room = %room, org_id = %ctx.org_id, "room join denied");
				let _ = tx
					.send(json!({"type": "error", "message": "room not allowed"}))
					.await;
				return;
			}

			state.bus.subscribe(conn_id, &room, tx.clone()).await;
			let _ = tx.send(json!({"type": "joined", "room": room})).await;
		}
		"ping" => {
			let _ = tx.send(json!({"type": "pong"})).await;
		}
		other => {
			debug!(conn_id = %conn_id, msg_type = %other, "unhandled WebSocket message type");
		}
	}
}

/// A room is joinable when it lies inside the key's tenant scope:
/// the org must match, and a project-scoped key may only join its own
/// project's room.
fn room_allowed(room: &str, ctx: &AuthContext) -> bool {
	let Some((org, project)) = room.split_once(':') else {
		return false;
	};
	if org != ctx.org_id.as_str() || project.is_empty() {
		return false;
	}
	match &ctx.project_id {
		Some(scoped) => scoped.as_str() == project,
		None => true,
	}
}
