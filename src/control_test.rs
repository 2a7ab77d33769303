use std::collections::HashMap;

use crate::control;
use crate::control::Disconnect;
use crate::control::NodeInfo;
use crate::control::Unsubscribe;

#[test]
fn test_node_info_codec_round_trip() {
    let mut metrics = HashMap::new();
    metrics.insert("node_num_clients".to_owned(), 42i64);
    let info = NodeInfo {
        uid: "n1".to_owned(),
        name: "pulse-1".to_owned(),
        version: "0.3.1".to_owned(),
        started_at: 1_700_000_000,
        metrics_update_interval: 60,
        metrics,
    };

    let params = control::encode_node(&info).expect("encode");
    let decoded = control::decode_node(&params).expect("decode");
    assert_eq!(decoded, info);
}

#[test]
fn test_unsubscribe_codec_keeps_channel() {
    let cmd = Unsubscribe {
        user: "u1".to_owned(),
        channel: "room".to_owned(),
    };
    let params = control::encode_unsubscribe(&cmd).expect("encode");
    let decoded = control::decode_unsubscribe(&params).expect("decode");
    assert_eq!(decoded.user, "u1");
    assert_eq!(decoded.channel, "room");
}

#[test]
fn test_disconnect_codec_keeps_reconnect_flag() {
    let cmd = Disconnect {
        user: "u1".to_owned(),
        reconnect: true,
    };
    let params = control::encode_disconnect(&cmd).expect("encode");
    let decoded = control::decode_disconnect(&params).expect("decode");
    assert!(decoded.reconnect);
}

#[test]
fn test_decode_rejects_garbage() {
    assert!(control::decode_node(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]).is_err());
    assert!(control::decode_unsubscribe(&[0xff; 9]).is_err());
}
