//! Minimal bot built on the session engine.
//!
//! Connects to a server, joins a channel once the MOTD ends, and answers
//! greetings addressed to it.

use anyhow::Result;
use slirc_client::{Connection, Line, Session, SessionConfig};

const CHANNEL: &str = "#slirc-test";

#[tokio::main]
async fn main() -> Result<()> {
    let host = std::env::args().nth(1).unwrap_or_else(|| "irc.libera.chat".to_string());

    let config = SessionConfig {
        nickname: "slircbot".to_string(),
        username: "slircbot".to_string(),
        realname: "slirc-client demo".to_string(),
        ..SessionConfig::default()
    };

    let mut conn = Connection::connect(&host, 6667, config).await?;

    let dispatcher = conn.dispatcher_mut();

    // end of MOTD: safe to join
    dispatcher.on("376", |session: &mut Session, _: &Line<'_>| {
        println!("registered, joining {}", CHANNEL);
        session.join(CHANNEL);
    });

    dispatcher.on("PRIVMSG", |session: &mut Session, line: &Line<'_>| {
        let (target, text) = match (line.arg(0), line.trailing()) {
            (Some(target), Some(text)) => (target, text),
            _ => return,
        };
        let nick = line.source_nick().unwrap_or("someone");
        println!("<{}> {}", nick, text);

        let me = session.nickname().to_string();
        if target.starts_with('#') && text.starts_with(&me) {
            let reply = format!("hello, {}!", nick);
            session.privmsg(target, &reply);
        }
    });

    match conn.run().await {
        Ok(()) => println!("connection closed"),
        Err(err) => eprintln!("connection lost: {}", err),
    }
    Ok(())
}
