//! Minimal application: run with `cargo run -p rill-server --example hello`,
//! then try `curl http://127.0.0.1:3000/users/42?verbose=1`.

use rill_server::{App, ListenConfig};

#[tokio::main]
async fn main() -> Result<(), rill_server::ServerError> {
    let server = App::new()
        .add_before_route(|req, _res| async move {
            println!("--> {} {}", req.method(), req.path());
            Ok(())
        })
        .get("/", |_req, res| async move {
            res.send("Hello, World!");
            Ok(())
        })
        .get("/users/:id", |req, res| async move {
            let id = req.path_params().require("id")?;
            res.send_json(&serde_json::json!({
                "id": id,
                "verbose": req.query("verbose").unwrap_or("0"),
            }));
            Ok(())
        })
        .post("/users", |req, res| async move {
            let body = req.body()?.clone();
            res.code(201).send_json(&body);
            Ok(())
        })
        .set_not_found(|_req, res| async move {
            res.code(404).send_json(&serde_json::json!({"error": "not found"}));
            Ok(())
        })
        .on_listening(|addr| println!("listening on http://{addr}"))
        .listen(ListenConfig::new(3000))
        .await?;

    server.wait().await
}
