//! Per-request verb handling.
//!
//! Each worker serves exactly one byte-pipe exchange: decode, act,
//! reply, done marker. Decode failures and unknown names are rejected
//! with a message and cause no side effect.

use super::SharedServices;
use crate::channels::{RemoteExchange, ServiceChannel};
use crate::model::{ServiceAction, ServiceList, ServiceRequest, ServiceSpec, Verb};
use log::{error, info};
use std::time::Duration;
use uuid::Uuid;

pub async fn handle_exchange(
    services: SharedServices,
    chan: ServiceChannel,
    mut exchange: RemoteExchange,
    payload_wait: Duration,
) {
    if !exchange.accept().await {
        return;
    }
    let Some(payload) = exchange.payload(payload_wait).await else {
        error!("Registry: done waiting for client");
        exchange.finish().await;
        return;
    };

    let request: ServiceRequest = match serde_json::from_slice(&payload) {
        Ok(request) => request,
        Err(e) => {
            error!("Registry: {e}");
            exchange.reply(format!("invalid request: {e}").into_bytes()).await;
            exchange.finish().await;
            return;
        }
    };

    let reply = match request.verb {
        Verb::Shutdown => {
            // Termination sentinel; consumed without a response.
            exchange.finish().await;
            return;
        }
        Verb::Register => register(&services, &chan, request).await,
        Verb::List => list(&services).await,
        Verb::Start | Verb::Stop | Verb::Restart | Verb::Delete | Verb::Status => {
            action(&services, &chan, request).await
        }
    };

    exchange.reply(reply).await;
    exchange.finish().await;
}

/// Register a new service: reserve the name, assign a suid, forward the
/// descriptor as new work.
async fn register(
    services: &SharedServices,
    chan: &ServiceChannel,
    request: ServiceRequest,
) -> Vec<u8> {
    let spec = ServiceSpec {
        suid: Uuid::new_v4().to_string(),
        name: request.name.clone(),
        command: request.command,
        args: request.args,
    };

    {
        let mut services = services.lock().await;
        if services.contains_key(&request.name) {
            let msg = format!("service {} already exists", request.name);
            error!("Registry: {msg}");
            return msg.into_bytes();
        }
        services.insert(request.name.clone(), spec.clone());
    }

    if chan.push(spec).await.is_err() {
        services.lock().await.remove(&request.name);
        error!("Registry: service channel closed, dropping {}", request.name);
        return b"service channel closed".to_vec();
    }

    info!("Registry: registered new service {}", request.name);
    format!("service {} has been registered", request.name).into_bytes()
}

/// Run one control action round trip against the supervisor.
async fn action(
    services: &SharedServices,
    chan: &ServiceChannel,
    request: ServiceRequest,
) -> Vec<u8> {
    let suid = {
        let services = services.lock().await;
        services.get(&request.name).map(|s| s.suid.clone())
    };
    let Some(suid) = suid else {
        let msg = format!("service {} does not exist", request.name);
        error!("Registry: {msg}");
        return msg.into_bytes();
    };

    let action = ServiceAction::new(request.verb, suid, request.name.clone());
    match chan.request(action).await {
        Ok(done) => {
            if request.verb == Verb::Delete {
                services.lock().await.remove(&request.name);
            }
            match serde_json::to_vec(&done) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("Registry: {e}");
                    e.to_string().into_bytes()
                }
            }
        }
        Err(e) => {
            error!("Registry: {e}");
            format!("done waiting for a response from the process pool: {e}").into_bytes()
        }
    }
}

async fn list(services: &SharedServices) -> Vec<u8> {
    let names: Vec<String> = {
        let services = services.lock().await;
        services.keys().cloned().collect()
    };
    if names.is_empty() {
        return b"no services".to_vec();
    }
    match serde_json::to_vec(&ServiceList { services: names }) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Registry: {e}");
            e.to_string().into_bytes()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn request(verb: Verb, name: &str) -> ServiceRequest {
        ServiceRequest {
            verb,
            name: name.to_string(),
            command: "/bin/true".to_string(),
            args: vec![],
        }
    }

    #[tokio::test]
    async fn duplicate_register_reports_conflict_and_keeps_first() {
        let services: SharedServices = Arc::new(Mutex::new(HashMap::new()));
        let (chan, mut recv) = ServiceChannel::new(Duration::from_secs(1));
        // Stub supervisor: accept every descriptor.
        tokio::spawn(async move { while recv.data_rx.recv().await.is_some() {} });

        let reply = register(&services, &chan, request(Verb::Register, "web")).await;
        assert_eq!(reply, b"service web has been registered");
        let first_suid = services.lock().await.get("web").unwrap().suid.clone();

        let reply = register(&services, &chan, request(Verb::Register, "web")).await;
        assert_eq!(reply, b"service web already exists");
        assert_eq!(services.lock().await.get("web").unwrap().suid, first_suid);
    }

    #[tokio::test]
    async fn action_on_unknown_name_is_rejected() {
        let services: SharedServices = Arc::new(Mutex::new(HashMap::new()));
        let (chan, _recv) = ServiceChannel::new(Duration::from_secs(1));

        let reply = action(&services, &chan, request(Verb::Start, "ghost")).await;
        assert_eq!(reply, b"service ghost does not exist");
    }

    #[tokio::test]
    async fn list_reports_no_services_then_names() {
        let services: SharedServices = Arc::new(Mutex::new(HashMap::new()));
        assert_eq!(list(&services).await, b"no services");

        services.lock().await.insert(
            "web".to_string(),
            ServiceSpec {
                suid: "suid-1".to_string(),
                name: "web".to_string(),
                command: "/bin/true".to_string(),
                args: vec![],
            },
        );
        let listed: ServiceList = serde_json::from_slice(&list(&services).await).unwrap();
        assert_eq!(listed.services, vec!["web"]);
    }
}
