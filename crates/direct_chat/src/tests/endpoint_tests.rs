use super::*;

#[test]
fn secure_origin_uses_wss() {
    let endpoint = Endpoint::from_page_origin("https://learn.example.org").expect("endpoint");
    assert!(endpoint.is_secure());
    assert_eq!(
        endpoint
            .url_for(&ParticipantId::from("14"), &ParticipantId::from("3"))
            .as_str(),
        "wss://learn.example.org/ws/direct-chat/14/3/"
    );
}

#[test]
fn plain_origin_keeps_port_and_uses_ws() {
    let endpoint = Endpoint::from_page_origin("http://127.0.0.1:8000").expect("endpoint");
    assert!(!endpoint.is_secure());
    assert_eq!(
        endpoint
            .url_for(&ParticipantId::from("a"), &ParticipantId::from("b"))
            .as_str(),
        "ws://127.0.0.1:8000/ws/direct-chat/a/b/"
    );
}

#[test]
fn page_path_and_query_are_discarded() {
    let endpoint =
        Endpoint::from_page_origin("https://learn.example.org/inbox/?tab=dm#top").expect("endpoint");
    assert_eq!(
        endpoint
            .url_for(&ParticipantId::from("a"), &ParticipantId::from("b"))
            .as_str(),
        "wss://learn.example.org/ws/direct-chat/a/b/"
    );
}

#[test]
fn participant_ids_are_percent_encoded() {
    let endpoint = Endpoint::from_page_origin("https://learn.example.org").expect("endpoint");
    let url = endpoint.url_for(&ParticipantId::from("a b"), &ParticipantId::from("c/d"));
    assert_eq!(url.path(), "/ws/direct-chat/a%20b/c%2Fd/");
}

#[test]
fn rejects_non_http_origins() {
    let err = Endpoint::from_page_origin("ftp://learn.example.org").expect_err("ftp origin");
    assert!(matches!(err, DirectChatError::InvalidOrigin { .. }));

    let err = Endpoint::from_page_origin("not a url").expect_err("garbage origin");
    assert!(matches!(err, DirectChatError::InvalidOrigin { .. }));
}
