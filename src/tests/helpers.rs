//! Shared test utilities: mock per-datasource transformers and event builders.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use crate::{
    error::VigilError,
    event::{EventAction, ExternalEvent, SyncMode},
    graph::{EntityGraph, SharedEntityGraph},
    processor::Processor,
    properties::{labels, Edge, EntityCategory, Vertex, VertexId},
    state::StateNormalizer,
    transformer::{
        placeholder_vertex, EntityWrapper, Neighbor, PlaceholderSeed, Transformer,
        TransformerRegistry,
    },
};

pub const NOVA_ZONE: &str = "nova.zone";
pub const NOVA_HOST: &str = "nova.host";
pub const NOVA_INSTANCE: &str = "nova.instance";
pub const NAGIOS: &str = "nagios";

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn sample_time(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
}

fn payload_str(event: &ExternalEvent, field: &str) -> Result<String, VigilError> {
    event
        .payload
        .get(field)
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            VigilError::Transform(format!(
                "event from '{}' is missing field '{field}'",
                event.datasource
            ))
        })
}

fn default_action(event: &ExternalEvent) -> EventAction {
    event.action.unwrap_or(match event.sync_mode {
        SyncMode::InitSnapshot => EventAction::CreateEntity,
        _ => EventAction::UpdateEntity,
    })
}

/// Availability zones: no neighbors of their own.
pub struct ZoneTransformer;

impl Transformer for ZoneTransformer {
    fn transform(&self, event: &ExternalEvent) -> Result<EntityWrapper, VigilError> {
        let name = payload_str(event, "name")?;
        let status = payload_str(event, "status")?;
        let vertex = Vertex::new(EntityCategory::Resource, "zone", &name)
            .with_name(&name)
            .with_state(&status)
            .with_sample_timestamp(event.sample_timestamp);
        Ok(EntityWrapper::new(vertex, default_action(event), vec![]))
    }

    fn extract_key(&self, event: &ExternalEvent) -> Result<VertexId, VigilError> {
        Ok(VertexId::from_key_fields(
            EntityCategory::Resource,
            "zone",
            &payload_str(event, "name")?,
        ))
    }

    fn create_placeholder_vertex(&self, seed: &PlaceholderSeed) -> Vertex {
        placeholder_vertex(EntityCategory::Resource, "zone", seed)
    }

    fn entity_types(&self) -> &[&str] {
        &["zone"]
    }
}

/// Compute hosts: contained by their availability zone.
pub struct HostTransformer;

impl Transformer for HostTransformer {
    fn transform(&self, event: &ExternalEvent) -> Result<EntityWrapper, VigilError> {
        let name = payload_str(event, "name")?;
        let status = payload_str(event, "status")?;
        let vertex = Vertex::new(EntityCategory::Resource, "host", &name)
            .with_name(&name)
            .with_state(&status)
            .with_sample_timestamp(event.sample_timestamp);

        let mut neighbors = vec![];
        if let Ok(zone_name) = payload_str(event, "zone") {
            let zone = ZoneTransformer.create_placeholder_vertex(&PlaceholderSeed {
                natural_key: zone_name,
                sample_timestamp: event.sample_timestamp,
            });
            let edge = Edge::new(
                zone.vertex_id.clone(),
                vertex.vertex_id.clone(),
                labels::CONTAINS,
            );
            neighbors.push(Neighbor::new(zone, edge));
        }
        Ok(EntityWrapper::new(vertex, default_action(event), neighbors))
    }

    fn extract_key(&self, event: &ExternalEvent) -> Result<VertexId, VigilError> {
        Ok(VertexId::from_key_fields(
            EntityCategory::Resource,
            "host",
            &payload_str(event, "name")?,
        ))
    }

    fn create_placeholder_vertex(&self, seed: &PlaceholderSeed) -> Vertex {
        placeholder_vertex(EntityCategory::Resource, "host", seed)
    }

    fn entity_types(&self) -> &[&str] {
        &["host"]
    }
}

/// Instances: run on a host.
pub struct InstanceTransformer;

impl Transformer for InstanceTransformer {
    fn transform(&self, event: &ExternalEvent) -> Result<EntityWrapper, VigilError> {
        let name = payload_str(event, "name")?;
        let status = payload_str(event, "status")?;
        let vertex = Vertex::new(EntityCategory::Resource, "instance", &name)
            .with_name(&name)
            .with_state(&status)
            .with_sample_timestamp(event.sample_timestamp);

        let host = HostTransformer.create_placeholder_vertex(&PlaceholderSeed {
            natural_key: payload_str(event, "host")?,
            sample_timestamp: event.sample_timestamp,
        });
        let edge = Edge::new(
            vertex.vertex_id.clone(),
            host.vertex_id.clone(),
            labels::ON,
        );
        Ok(EntityWrapper::new(
            vertex,
            default_action(event),
            vec![Neighbor::new(host, edge)],
        ))
    }

    fn extract_key(&self, event: &ExternalEvent) -> Result<VertexId, VigilError> {
        Ok(VertexId::from_key_fields(
            EntityCategory::Resource,
            "instance",
            &payload_str(event, "name")?,
        ))
    }

    fn create_placeholder_vertex(&self, seed: &PlaceholderSeed) -> Vertex {
        placeholder_vertex(EntityCategory::Resource, "instance", seed)
    }

    fn entity_types(&self) -> &[&str] {
        &["instance"]
    }
}

/// Monitoring checks: alarms attached to the host they report on.
pub struct NagiosTransformer;

impl Transformer for NagiosTransformer {
    fn transform(&self, event: &ExternalEvent) -> Result<EntityWrapper, VigilError> {
        let resource = payload_str(event, "resource_name")?;
        let service = payload_str(event, "service")?;
        let status = payload_str(event, "status")?;
        let key = format!("{resource}:{service}");
        let vertex = Vertex::new(EntityCategory::Alarm, "nagios-service", &key)
            .with_name(&service)
            .with_state(&status)
            .with_sample_timestamp(event.sample_timestamp);

        let host = HostTransformer.create_placeholder_vertex(&PlaceholderSeed {
            natural_key: resource,
            sample_timestamp: event.sample_timestamp,
        });
        let edge = Edge::new(
            vertex.vertex_id.clone(),
            host.vertex_id.clone(),
            labels::ON,
        );
        Ok(EntityWrapper::new(
            vertex,
            default_action(event),
            vec![Neighbor::new(host, edge)],
        ))
    }

    fn extract_key(&self, event: &ExternalEvent) -> Result<VertexId, VigilError> {
        let key = format!(
            "{}:{}",
            payload_str(event, "resource_name")?,
            payload_str(event, "service")?
        );
        Ok(VertexId::from_key_fields(
            EntityCategory::Alarm,
            "nagios-service",
            &key,
        ))
    }

    fn create_placeholder_vertex(&self, seed: &PlaceholderSeed) -> Vertex {
        placeholder_vertex(EntityCategory::Alarm, "nagios-service", seed)
    }

    fn entity_types(&self) -> &[&str] {
        &["nagios-service"]
    }
}

pub fn test_registry() -> TransformerRegistry {
    let mut registry = TransformerRegistry::new();
    registry.insert(NOVA_ZONE.to_string(), Box::new(ZoneTransformer));
    registry.insert(NOVA_HOST.to_string(), Box::new(HostTransformer));
    registry.insert(NOVA_INSTANCE.to_string(), Box::new(InstanceTransformer));
    registry.insert(NAGIOS.to_string(), Box::new(NagiosTransformer));
    registry
}

pub fn test_processor(name: &str) -> Processor {
    init_logging();
    Processor::new(
        SharedEntityGraph::new(EntityGraph::new(name)),
        test_registry(),
        StateNormalizer::with_defaults(),
    )
}

pub fn zone_event(
    sync_mode: SyncMode,
    timestamp: DateTime<Utc>,
    name: &str,
    status: &str,
) -> ExternalEvent {
    ExternalEvent::new(
        NOVA_ZONE,
        sync_mode,
        timestamp,
        json!({ "name": name, "status": status }),
    )
}

pub fn host_event(
    sync_mode: SyncMode,
    timestamp: DateTime<Utc>,
    name: &str,
    status: &str,
    zone: &str,
) -> ExternalEvent {
    ExternalEvent::new(
        NOVA_HOST,
        sync_mode,
        timestamp,
        json!({ "name": name, "status": status, "zone": zone }),
    )
}

pub fn instance_event(
    sync_mode: SyncMode,
    timestamp: DateTime<Utc>,
    name: &str,
    status: &str,
    host: &str,
) -> ExternalEvent {
    ExternalEvent::new(
        NOVA_INSTANCE,
        sync_mode,
        timestamp,
        json!({ "name": name, "status": status, "host": host }),
    )
}

pub fn alarm_event(
    sync_mode: SyncMode,
    timestamp: DateTime<Utc>,
    resource_name: &str,
    service: &str,
    status: &str,
) -> ExternalEvent {
    ExternalEvent::new(
        NAGIOS,
        sync_mode,
        timestamp,
        json!({ "resource_name": resource_name, "service": service, "status": status }),
    )
}

pub fn zone_id(name: &str) -> VertexId {
    VertexId::from_key_fields(EntityCategory::Resource, "zone", name)
}

pub fn host_id(name: &str) -> VertexId {
    VertexId::from_key_fields(EntityCategory::Resource, "host", name)
}

pub fn instance_id(name: &str) -> VertexId {
    VertexId::from_key_fields(EntityCategory::Resource, "instance", name)
}

pub fn alarm_id(resource_name: &str, service: &str) -> VertexId {
    VertexId::from_key_fields(
        EntityCategory::Alarm,
        "nagios-service",
        &format!("{resource_name}:{service}"),
    )
}
