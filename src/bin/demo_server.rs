//! Wiring for a minimal demo host: one static GET route, one upload
//! endpoint, and an SSI variable. Grounded on the teacher's own
//! `src/bin/main.rs` process wiring, minus the YAML config file load
//! (configuration here is constructed programmatically, per
//! `SPEC_FULL.md` §3).

use std::io::Write;
use std::sync::{Arc, Mutex};

use mhttpd::{Config, Server};

fn main() {
    let uploads: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let upload_sink = uploads.clone();

    let config = Config::new(8080)
        .with_get_handler(
            "/",
            Arc::new(|conn, _target, _params, source_address| {
                mhttpd_log::info!("GET / from {source_address}");
                let body = b"<html><body>mhttpd demo: <!--#echo var=\"uptime\" --></body></html>";
                let _ = mhttpd::send_response(
                    conn,
                    mhttpd::HTTP_OK,
                    Some("text/html"),
                    body.len(),
                    None,
                    Some(body),
                );
            }),
        )
        .with_post_handler(Arc::new(
            move |_conn, uri, filename, source_address, start, finish, chunk, total_length| {
                if start {
                    mhttpd_log::info!(
                        "upload to {uri} from {source_address} ({total_length} bytes, file {:?})",
                        filename
                    );
                } else if finish {
                    mhttpd_log::info!("upload to {uri} complete");
                } else {
                    upload_sink.lock().unwrap().extend_from_slice(chunk);
                }
            },
        ))
        .with_ssi_handler(Arc::new(|conn, name| {
            if name == "uptime" {
                conn.stream.write_all(b"just started")
            } else {
                Ok(())
            }
        }));

    let mut server = match Server::start(config) {
        Ok(server) => server,
        Err(e) => {
            mhttpd_log::errors!("failed to start: {e}");
            std::process::exit(1);
        }
    };

    mhttpd_log::info!("listening on 0.0.0.0:8080");
    loop {
        if let Err(e) = server.process() {
            mhttpd_log::errors!("process tick failed: {e}");
            break;
        }
    }
}
