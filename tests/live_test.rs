//! Live reload flow: build, edit, broadcast, runtime update

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use markmod::{
    create_handler, transform, EmitOptions, InProcessChannel, LiveClient, LiveMessage, LiveServer,
    PushChannel, RuntimeModule, Session, TextSink, TransformOutput, WatchList,
};

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

#[tokio::test]
async fn test_edit_is_broadcast_once_with_new_source() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "source.html", "<div>foobar</div>");
    let session = Session::new(dir.path());
    let channel = Arc::new(InProcessChannel::new("test"));
    let watcher = Arc::new(WatchList::new());
    let mut subscription = channel.subscribe().await.unwrap();

    let server = LiveServer::attach(&session, channel.clone(), watcher.clone()).await.unwrap();

    // initial build registers the file with the watcher
    let handler = create_handler(&session, "source.html", None).await.unwrap().unwrap();
    handler.run("<div>foobar</div>").await.unwrap();
    assert!(watcher.contains("source.html"));

    write(dir.path(), "source.html", "<div>X</div>");
    let sent = server.notify_change(dir.path().join("source.html")).await.unwrap();
    assert_eq!(sent, Some(LiveMessage::change("source.html", "<div>X</div>")));

    let received = subscription.next().await.unwrap();
    assert_eq!(
        serde_json::to_value(&received).unwrap(),
        serde_json::json!({"type": "change", "uid": "source.html", "src": "<div>X</div>"})
    );

    // nothing else was sent
    channel.broadcast(&LiveMessage::change("end", "")).await.unwrap();
    assert_eq!(subscription.next().await, Some(LiveMessage::change("end", "")));
}

#[tokio::test]
async fn test_live_module_subscribes_to_its_identity() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("views")).unwrap();
    write(dir.path(), "views/page.html", "<p></p>");
    let session = Session::new(dir.path());
    session.enable_live().await;

    let out = transform(&session, "views/page.html", "<p></p>".to_string(), None, &EmitOptions::default())
        .await
        .unwrap();
    let TransformOutput::Module(code) = out else {
        panic!("expected a module");
    };
    assert!(code.ends_with(
        "\nrequire(\"../node_modules/markmod/live-client.js\").on(\"change:views/page.html\", function(src) { module.exports.update(src)})"
    ));
}

#[tokio::test]
async fn test_broadcast_reaches_inserted_sink() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "widget.svg", "<svg></svg>");
    let session = Session::new(dir.path());
    let channel = Arc::new(InProcessChannel::default());
    let server = LiveServer::attach(&session, channel.clone(), Arc::new(WatchList::new()))
        .await
        .unwrap();

    let module = RuntimeModule::new("<svg></svg>");
    let sink = Arc::new(TextSink::new());
    let _inserted = module.insert(&sink);

    let client = Arc::new(LiveClient::new());
    client.bind("widget.svg", &module);
    let pump = {
        let client = client.clone();
        let messages = channel.subscribe().await.unwrap();
        tokio::spawn(async move { client.listen(messages).await })
    };

    write(dir.path(), "widget.svg", "<svg><circle/></svg>");
    server.notify_change("widget.svg").await.unwrap();

    drop(server);
    drop(channel);
    pump.await.unwrap();

    assert_eq!(module.src(), "<svg><circle/></svg>");
    assert_eq!(sink.content(), "<svg><circle/></svg>");
}
