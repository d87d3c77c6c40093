//! Property: every client-restorable `ClientMessage` variant survives an
//! envelope save/parse round trip through JSON, except the four result
//! types a client is never trusted to hand back (spec §4.G, §9 open
//! question 2).

use worldgraph::entity::EntityType;
use worldgraph::id::Id;
use worldgraph::protocol::{
    restore_message, ClientMessage, ClientMessageEnvelope, ClientMessageType, FoundEntity, MessageFactory,
    SiteListEntry,
};

fn sample_payloads() -> Vec<ClientMessage> {
    vec![
        ClientMessage::DataAcknowledge { message_ser_id: 1 },
        ClientMessage::DataAcknowledgeReconnect { message_ser_id: 2 },
        ClientMessage::ChannelStatusChange {
            channel_name: "main".to_string(),
            status: "Open".to_string(),
        },
        ClientMessage::RequestSiteList,
        ClientMessage::AuthenticationRequest {
            name: "Alice".to_string(),
            password: "hunter2".to_string(),
            site: 1,
            is_reconnect: false,
            window_size: 16,
        },
        ClientMessage::ChannelRequestClose {
            channels_to_close: vec!["main".to_string()],
        },
        ClientMessage::Disconnect,
        ClientMessage::ChannelData {
            channel_name: "main".to_string(),
            payload: vec![1, 2, 3],
        },
        ClientMessage::TextData {
            text_data: "hello".to_string(),
        },
        ClientMessage::ConnectPuppetRequest {
            puppet_entity_id: Id::new(1, 9),
        },
        ClientMessage::ExecuteEntity {
            entity_id: Id::new(1, 9),
            program_arguments: Some(vec!["look".to_string()]),
            channel_subtype: None,
        },
        ClientMessage::FindEntityRequest {
            search_string: Some("sword".to_string()),
            exact_match: false,
            entity_type: EntityType::Thing,
        },
        ClientMessage::MatchNameRequest {
            search_string: "swo".to_string(),
            exact_match: false,
            entity_type: EntityType::Thing,
        },
        ClientMessage::LocationInfoChange {
            new_room_id: Some(Id::new(1, 20)),
            new_room_name: Some("Landing".to_string()),
        },
    ]
}

#[test]
fn client_restorable_payloads_round_trip() {
    for (i, payload) in sample_payloads().into_iter().enumerate() {
        let envelope = ClientMessageEnvelope::new(i as u64, false, payload);
        let wire = envelope.save();
        let restored = restore_message(&wire)
            .unwrap_or_else(|e| panic!("payload {i} failed to parse: {e}"))
            .unwrap_or_else(|| panic!("payload {i} unexpectedly refused restoration"));
        assert_eq!(restored, envelope);
    }
}

#[test]
fn server_only_result_payloads_never_restore() {
    let auth_result = ClientMessageEnvelope::new(
        1,
        true,
        ClientMessage::AuthenticationResult {
            authentication_result: true,
            negotiation_result: true,
        },
    );
    let site_list = ClientMessageEnvelope::new(
        2,
        true,
        ClientMessage::SiteList {
            sites: vec![SiteListEntry {
                id: 1,
                name: "Alpha".to_string(),
                description: "".to_string(),
                online_count: 0,
            }],
        },
    );
    let find_result = ClientMessageEnvelope::new(
        3,
        true,
        ClientMessage::FindEntityResult {
            result: vec![FoundEntity {
                id: Id::new(1, 2),
                name: "sword".to_string(),
                entity_type: EntityType::Thing,
            }],
            security_violation: false,
            ambiguous: false,
            error: false,
            error_message: None,
        },
    );
    let match_result = ClientMessageEnvelope::new(
        4,
        true,
        ClientMessage::MatchNameResult {
            matching_ids: vec![Id::new(1, 2)],
            security_violation: false,
            ambiguous: false,
        },
    );

    assert_eq!(restore_message(&auth_result.save()).unwrap(), None);
    assert_eq!(restore_message(&site_list.save()).unwrap(), None);
    assert_eq!(restore_message(&find_result.save()).unwrap(), None);
    assert_eq!(restore_message(&match_result.save()).unwrap(), None);
}

#[test]
fn factory_blank_instances_report_their_own_type_back() {
    let factory = MessageFactory::new();
    for message_type in [
        ClientMessageType::DataAcknowledge,
        ClientMessageType::AuthenticationRequest,
        ClientMessageType::TextData,
        ClientMessageType::FindEntityResult,
    ] {
        let blank = factory.make_instance(message_type).expect("registered type");
        assert_eq!(blank.message_type(), message_type);
    }
}
