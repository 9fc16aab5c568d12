//! Shared model and helpers for unit tests.

use std::sync::Arc;

use sws_schema::ModelInfo;
use sws_types::{AttrId, Attribute, AttributeValue, ObjectId, ObjectType};

use crate::store::SwitchStore;

pub const VLAN: ObjectType = ObjectType(1);
pub const PORT: ObjectType = ObjectType(2);
pub const QUEUE: ObjectType = ObjectType(3);
pub const NEXTHOP: ObjectType = ObjectType(4);
pub const ROUTE: ObjectType = ObjectType(5);
pub const NEXTHOP_AUTO: ObjectType = ObjectType(6);

pub const VLAN_ID: AttrId = 101;
pub const VLAN_LEARN_DISABLE: AttrId = 102;
pub const VLAN_NAME: AttrId = 103;
pub const VLAN_MEMBER_PORTS: AttrId = 104;

pub const PORT_LANE_LIST: AttrId = 201;
pub const PORT_PFC_ENABLE: AttrId = 202;
pub const PORT_SPEED: AttrId = 203;
pub const PORT_ADMIN_STATE: AttrId = 204;
pub const PORT_QUEUE_LIST: AttrId = 205;
pub const PORT_PORT_ID: AttrId = 206;
pub const PORT_RX_PACKETS: AttrId = 207;

pub const QUEUE_PORT: AttrId = 301;
pub const QUEUE_INDEX: AttrId = 302;

pub const NEXTHOP_IP: AttrId = 401;

pub const ROUTE_PREFIX: AttrId = 501;
pub const ROUTE_NEXTHOP: AttrId = 502;
pub const ROUTE_BACKUP_NEXTHOP: AttrId = 503;

pub const NHA_NEXTHOP: AttrId = 601;

pub const MODEL: &str = r#"{
    "objects": [
        {
            "name": "vlan", "id": 1,
            "attributes": [
                { "id": 101, "name": "vlan_id", "type": "u16", "flags": { "mandatory": true } },
                { "id": 102, "name": "learn_disable", "type": "bool" },
                { "id": 103, "name": "name", "type": "string", "max_len": 32 },
                { "id": 104, "name": "member_ports", "type": "list", "list_type": "object_id",
                  "allowed_types": ["port"] }
            ],
            "key_groups": [["vlan_id"]]
        },
        {
            "name": "port", "id": 2,
            "attributes": [
                { "id": 201, "name": "lane_list", "type": "list", "list_type": "u32" },
                { "id": 202, "name": "pfc_enable", "type": "bool" },
                { "id": 203, "name": "speed", "type": "u32", "default": 25000 },
                { "id": 204, "name": "admin_state", "type": "enum",
                  "enum_values": { "down": 0, "up": 1 }, "default": "down" },
                { "id": 205, "name": "queue_list", "type": "list", "list_type": "object_id",
                  "flags": { "read_only": true } },
                { "id": 206, "name": "port_id", "type": "u32" },
                { "id": 207, "name": "rx_packets", "type": "u64",
                  "flags": { "read_only": true, "is_counter": true } }
            ],
            "key_groups": [["port_id"]]
        },
        {
            "name": "queue", "id": 3,
            "attributes": [
                { "id": 301, "name": "port", "type": "object_id", "allowed_types": ["port"],
                  "flags": { "mandatory": true, "create_only": true } },
                { "id": 302, "name": "index", "type": "u8" }
            ],
            "key_groups": [["port", "index"]],
            "membership": [
                { "group": "port", "member_attr": "port", "group_list_attr": "queue_list" }
            ]
        },
        {
            "name": "nexthop", "id": 4,
            "attributes": [
                { "id": 401, "name": "ip", "type": "ip", "flags": { "mandatory": true } }
            ],
            "key_groups": [["ip"]]
        },
        {
            "name": "route", "id": 5,
            "attributes": [
                { "id": 501, "name": "prefix", "type": "prefix", "flags": { "mandatory": true } },
                { "id": 502, "name": "nexthop", "type": "object_id", "allowed_types": ["nexthop"],
                  "flags": { "re_evaluate": true } },
                { "id": 503, "name": "backup_nexthop", "type": "object_id",
                  "allowed_types": ["nexthop"], "flags": { "re_evaluate": true } }
            ],
            "key_groups": [["prefix"]]
        },
        {
            "name": "nexthop_auto", "id": 6, "class": "auto",
            "attributes": [
                { "id": 601, "name": "nexthop", "type": "object_id", "allowed_types": ["nexthop"],
                  "flags": { "mandatory": true } }
            ]
        }
    ]
}"#;

pub fn model() -> Arc<ModelInfo> {
    Arc::new(ModelInfo::from_json_str(MODEL).unwrap())
}

/// A store over [`MODEL`] with the nexthop triggers installed.
pub fn store() -> SwitchStore {
    let store = SwitchStore::with_model(model());
    install_nexthop_triggers(&store);
    store
}

/// A nexthop that some USER object refers to owns exactly one
/// `nexthop_auto` object; the last referrer going away removes it.
pub fn install_nexthop_triggers(store: &SwitchStore) {
    store
        .on_create_after(NEXTHOP, |store, ctx, args| {
            let nh = args.object_id;
            if store.user_referrer_count(nh) == 0 || !auto_referrers(store, nh).is_empty() {
                return Ok(());
            }
            store
                .create_with(ctx, NEXTHOP_AUTO, &[Attribute::new(NHA_NEXTHOP, nh)])
                .map(|_| ())
        })
        .unwrap();
    store
        .on_delete_before(NEXTHOP, |store, ctx, args| {
            auto_referrers(store, args.object_id)
                .into_iter()
                .try_for_each(|auto| store.delete_with(ctx, auto))
        })
        .unwrap();
}

fn auto_referrers(store: &SwitchStore, nh: ObjectId) -> Vec<ObjectId> {
    let mut autos: Vec<ObjectId> = store
        .referrers(nh)
        .into_iter()
        .map(|e| e.referencing)
        .filter(|r| r.object_type() == NEXTHOP_AUTO)
        .collect();
    autos.dedup();
    autos
}

pub fn auto_objects(store: &SwitchStore) -> Vec<ObjectId> {
    store.get_all_handles(NEXTHOP_AUTO).unwrap()
}

pub fn create_port(store: &SwitchStore, port_id: u32) -> ObjectId {
    store
        .create(PORT, &[Attribute::new(PORT_PORT_ID, port_id)])
        .unwrap()
}

pub fn create_queue(store: &SwitchStore, port: ObjectId, index: u8) -> ObjectId {
    store
        .create(
            QUEUE,
            &[
                Attribute::new(QUEUE_PORT, port),
                Attribute::new(QUEUE_INDEX, AttributeValue::U8(index)),
            ],
        )
        .unwrap()
}

pub fn create_nexthop(store: &SwitchStore, ip: &str) -> ObjectId {
    let ip: std::net::IpAddr = ip.parse().unwrap();
    store
        .create(NEXTHOP, &[Attribute::new(NEXTHOP_IP, AttributeValue::Ip(ip))])
        .unwrap()
}

pub fn create_route(store: &SwitchStore, prefix: &str, nexthop: ObjectId) -> ObjectId {
    let prefix: sws_types::IpPrefix = prefix.parse().unwrap();
    store
        .create(
            ROUTE,
            &[
                Attribute::new(ROUTE_PREFIX, AttributeValue::Prefix(prefix)),
                Attribute::new(ROUTE_NEXTHOP, nexthop),
            ],
        )
        .unwrap()
}
