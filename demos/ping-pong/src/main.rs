use std::time::{SystemTime, UNIX_EPOCH};

use tandem::prelude::*;

// ---------------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------------

/// `ping(value)` returns a `pong` function that hands `value` back.
/// `rollTheDice(n)` fails on 7.
fn server_api() -> Result<LocalApi, PeerError> {
    LocalApi::builder()
        .method_fn("ping", |args| {
            let value = args.first().cloned().unwrap_or_default();
            let pong = Function::from_fn(move |_| Ok(value.clone()));
            Ok(Value::from(pong))
        })
        .method_fn("rollTheDice", |args| {
            match args.first().and_then(Value::as_i64) {
                Some(7) => Err(RemoteError::new("Craps").with_name("Error")),
                Some(n) => Ok(Value::from(n)),
                None => Err(RemoteError::new("rollTheDice expects a number")),
            }
        })
        .method("countdown", |args| async move {
            let from = args.first().and_then(Value::as_i64).unwrap_or_default();
            let tick = args
                .get(1)
                .and_then(Value::as_function)
                .cloned()
                .ok_or_else(|| RemoteError::new("countdown expects a callback"))?;
            for n in (0..=from).rev() {
                tick.call(vec![Value::from(n)]).await?;
            }
            Ok(Value::Unit)
        })
        .build()
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tandem::init_tracing();

    let listener = WebSocketListener::bind("127.0.0.1:0").await?;
    let url = format!("ws://{}", listener.local_addr()?);
    eprintln!("ping-pong server listening on {url}");

    let api = server_api()?;
    let server = tokio::spawn(async move {
        let channel = listener.accept().await?;
        let peer = tandem::expose(api).name("server").connect(channel)?;
        Ok::<_, TandemError>(peer)
    });

    let channel = WebSocketChannel::connect(&url).await?;
    let client = PeerBuilder::new().name("client").connect(channel)?;
    let server = server.await??;

    let sent = now_millis();
    let pong = client.invoke("ping", vec![Value::from(sent)]).await?;
    let pong = pong
        .as_function()
        .ok_or("ping should return a function")?;
    let echoed = pong.call(vec![]).await?;
    eprintln!("pong returned {:?} (sent {sent})", echoed.as_i64());

    match client.invoke("rollTheDice", vec![Value::from(7)]).await {
        Ok(value) => eprintln!("rolled {:?}", value.as_i64()),
        Err(err) => eprintln!("rollTheDice failed: {err}"),
    }

    let tick = Function::from_fn(|args| {
        eprintln!("countdown: {:?}", args.first().and_then(Value::as_i64));
        Ok(Value::Unit)
    });
    client
        .invoke("countdown", vec![Value::from(3), Value::from(tick)])
        .await?;

    client.dispose();
    server.dispose();
    tracing::info!("ping-pong finished");
    Ok(())
}
