mod support;

use poolis::proto::frame::Frame;
use poolis::{command, Client, Error};
use support::{bulk, nil, server_err, status, FakeServer};

/// Scripted transaction endpoint: MULTI/EXEC/DISCARD succeed, SET on
/// key "b" is rejected at queue time, everything else queues.
async fn transactional_server() -> FakeServer {
    FakeServer::spawn(|args| match args[0].as_str() {
        "MULTI" => vec![status("OK")],
        "EXEC" => vec![Frame::Array(vec![status("OK"), status("OK")])],
        "DISCARD" => vec![status("OK")],
        "SET" if args[1] == "b" => vec![server_err("ERR forced failure")],
        "SET" => vec![status("QUEUED")],
        "GET" => vec![bulk("v")],
        _ => vec![server_err("ERR unknown command")],
    })
    .await
}

#[tokio::test]
async fn test_multi_command_pipelines_in_order() {
    let server = FakeServer::spawn(|args| match args[0].as_str() {
        "SET" => vec![status("OK")],
        "GET" => vec![bulk("v")],
        _ => vec![server_err("ERR unknown command")],
    })
    .await;
    let client = Client::new(server.configuration()).unwrap();

    let reply = client
        .multi_command(|batch| {
            batch.queue(command::set("a", "1"));
            batch.queue(command::get("a"));
        })
        .await;

    assert!(reply.is_ok());
    let elements = reply.elements().unwrap();
    assert_eq!(elements.len(), 2);
    assert_eq!(elements[1].as_text().as_deref(), Some("v"));
    assert_eq!(server.names(), vec!["SET", "GET"]);
    assert_eq!(server.accepted(), 1);
}

#[tokio::test]
async fn test_multi_command_keeps_embedded_errors() {
    let server = FakeServer::spawn(|args| match args[0].as_str() {
        "SET" => vec![status("OK")],
        _ => vec![server_err("ERR unknown command")],
    })
    .await;
    let client = Client::new(server.configuration()).unwrap();

    let reply = client
        .multi_command(|batch| {
            batch.queue(command::set("a", "1"));
            batch.queue(command::Cmd::new("NOSUCH"));
        })
        .await;

    // The batch reply stays a value; the rejection is an element.
    assert!(reply.is_ok());
    let elements = reply.elements().unwrap();
    assert!(matches!(&elements[1], Frame::Error(message) if message.contains("unknown")));
}

#[tokio::test]
async fn test_transaction_commits() {
    let server = transactional_server().await;
    let client = Client::new(server.configuration()).unwrap();

    let reply = client
        .transaction(|batch| {
            batch.queue(command::set("a", "1"));
            batch.queue(command::set("c", "2"));
        })
        .await;

    assert!(reply.is_ok());
    assert_eq!(reply.elements().map(<[Frame]>::len), Some(2));
    assert_eq!(server.names(), vec!["MULTI", "SET", "SET", "EXEC"]);
}

#[tokio::test]
async fn test_transaction_rolls_back_on_queue_rejection() {
    let server = transactional_server().await;
    let client = Client::new(server.configuration()).unwrap();

    let reply = client
        .transaction(|batch| {
            batch.queue(command::set("a", "1"));
            batch.queue(command::set("b", "2"));
        })
        .await;

    assert!(matches!(reply.error(), Some(Error::Server { message }) if message.contains("forced")));

    let names = server.names();
    assert_eq!(names.iter().filter(|name| *name == "DISCARD").count(), 1);
    assert_eq!(names.iter().filter(|name| *name == "EXEC").count(), 0);
}

#[tokio::test]
async fn test_transaction_aborted_exec_is_an_error() {
    let server = FakeServer::spawn(|args| match args[0].as_str() {
        "MULTI" => vec![status("OK")],
        "SET" => vec![status("QUEUED")],
        // A null EXEC reply: the server refused to commit.
        "EXEC" => vec![nil()],
        _ => vec![server_err("ERR unknown command")],
    })
    .await;
    let client = Client::new(server.configuration()).unwrap();

    let reply = client
        .transaction(|batch| {
            batch.queue(command::set("a", "1"));
        })
        .await;

    assert!(matches!(reply.error(), Some(Error::Server { message }) if message.contains("aborted")));
}

#[tokio::test]
async fn test_empty_batches_send_nothing() {
    let server = transactional_server().await;
    let client = Client::new(server.configuration()).unwrap();

    let reply = client.multi_command(|_| {}).await;
    assert!(reply.is_ok());
    assert_eq!(reply.elements().map(<[Frame]>::len), Some(0));

    let reply = client.transaction(|_| {}).await;
    assert!(reply.is_ok());

    assert!(server.commands().is_empty());
}

#[tokio::test]
async fn test_async_transaction_matches_sync() {
    let server = transactional_server().await;
    let client = Client::new(server.configuration()).unwrap();

    let handle = client.async_transaction(|batch| {
        batch.queue(command::set("a", "1"));
        batch.queue(command::set("c", "2"));
    });
    let reply = handle.wait().await;

    assert!(reply.is_ok());
    assert_eq!(reply.elements().map(<[Frame]>::len), Some(2));
}

#[tokio::test]
async fn test_async_multi_command_fulfills_once() {
    let server = transactional_server().await;
    let client = Client::new(server.configuration()).unwrap();

    let handle = client.async_multi_command(|batch| {
        batch.queue(command::get("a"));
    });
    let first = handle.wait().await;
    let second = handle.wait().await;
    assert_eq!(first.elements().is_some(), second.elements().is_some());
}
