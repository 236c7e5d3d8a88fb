#![deny(rust_2018_idioms)]

use std::io::BufRead;
use std::io::Read;
use std::sync::Mutex;
use std::time::Duration;

use rain::net::{
    ConnectOptions, Family, GaiFlags, Host, Protocol, ServeOptions, Specification, SocketType,
};
use rain::smtp::{
    Client, Command, Handler, PreResponse, Request, Response, Server, Session, StatusCode,
};
use rain::stream::StreamConfig;
use rain::Timeout;

fn tcp4() -> Specification {
    Specification::new(Family::Inet, SocketType::Stream, Protocol::Tcp)
}

/// Accepts mail into memory; authenticates exactly one credential pair.
struct MailSink {
    messages: Mutex<Vec<String>>,
}

impl MailSink {
    fn new() -> MailSink {
        MailSink {
            messages: Mutex::new(Vec::new()),
        }
    }
}

impl Handler for MailSink {
    fn on_data(&self, _session: &mut Session, data: &mut dyn BufRead) -> PreResponse {
        let mut body = String::new();
        if data.read_to_string(&mut body).is_err() {
            return PreResponse::reply(StatusCode::TransactionFailed);
        }
        self.messages.lock().unwrap().push(body);
        PreResponse::reply(StatusCode::RequestCompleted)
    }

    fn on_auth_login(&self, username: &str, password: &str) -> PreResponse {
        if username == "user" && password == "secret" {
            PreResponse::reply(StatusCode::AuthenticationSucceeded)
        } else {
            PreResponse::reply(StatusCode::AuthenticationInvalid)
        }
    }
}

fn serve() -> (Server<MailSink>, Host) {
    let _ = pretty_env_logger::try_init();
    let server =
        Server::with_config(tcp4(), 16, StreamConfig::default(), MailSink::new()).unwrap();
    server
        .serve(&Host::parse("127.0.0.1:0"), ServeOptions::default())
        .unwrap();
    let host = server.local_host().unwrap();
    (server, host)
}

fn connect_options() -> ConnectOptions {
    // ADDRCONFIG can hide the mapped loopback on hosts without a global
    // IPv6 address.
    ConnectOptions {
        gai_flags: GaiFlags::V4MAPPED | GaiFlags::ALL,
        ..ConnectOptions::default()
    }
}

fn connect(host: &Host) -> Client {
    let mut client = Client::connect(host, &connect_options()).unwrap();
    let greeting = client.recv().unwrap();
    assert_eq!(greeting.status, StatusCode::ServiceReady);
    client
}

fn exchange(client: &mut Client, request: Request) -> Response {
    let mut request = request;
    client.send(&mut request).unwrap();
    client.recv().unwrap()
}

#[test]
fn happy_path_transaction() {
    let (server, host) = serve();
    let mut client = connect(&host);

    let res = exchange(&mut client, Request::with_parameter(Command::Ehlo, "a"));
    assert_eq!(res.status, StatusCode::RequestCompleted);

    let res = exchange(
        &mut client,
        Request::with_parameter(Command::Mail, "FROM:<u@x>"),
    );
    assert_eq!(res.status, StatusCode::RequestCompleted);

    let res = exchange(
        &mut client,
        Request::with_parameter(Command::Rcpt, "TO:<v@y>"),
    );
    assert_eq!(res.status, StatusCode::RequestCompleted);

    let res = exchange(&mut client, Request::new(Command::Data));
    assert_eq!(res.status, StatusCode::StartMailInput);

    client.send_data(b"hi").unwrap();
    let res = client.recv().unwrap();
    assert_eq!(res.status, StatusCode::RequestCompleted);

    let res = exchange(&mut client, Request::new(Command::Quit));
    assert_eq!(res.status, StatusCode::ServiceClosing);

    // The peer closes after QUIT.
    assert!(client.recv().is_err());
    client.close(Timeout::new(Duration::from_secs(5))).unwrap();

    assert!(!server.block_for_tasks(Timeout::new(Duration::from_secs(5))));
    assert_eq!(
        *server.handler().messages.lock().unwrap(),
        vec!["hi".to_owned()]
    );
    server.close(Timeout::new(Duration::from_secs(5)));
}

#[test]
fn data_requires_a_transaction() {
    let (server, host) = serve();
    let mut client = connect(&host);

    let res = exchange(&mut client, Request::new(Command::Data));
    assert_eq!(res.status, StatusCode::BadSequenceCommand);

    let res = exchange(&mut client, Request::new(Command::Quit));
    assert_eq!(res.status, StatusCode::ServiceClosing);
    server.close(Timeout::new(Duration::from_secs(5)));
}

#[test]
fn rset_clears_the_transaction() {
    let (server, host) = serve();
    let mut client = connect(&host);

    exchange(&mut client, Request::with_parameter(Command::Mail, "FROM:<u@x>"));
    exchange(&mut client, Request::with_parameter(Command::Rcpt, "TO:<v@y>"));

    let res = exchange(&mut client, Request::new(Command::Rset));
    assert_eq!(res.status, StatusCode::RequestCompleted);
    assert_eq!(res.lines, vec!["OK"]);

    // The reset transaction refuses DATA again.
    let res = exchange(&mut client, Request::new(Command::Data));
    assert_eq!(res.status, StatusCode::BadSequenceCommand);
    server.close(Timeout::new(Duration::from_secs(5)));
}

#[test]
fn auth_login_challenge_flow() {
    let (server, host) = serve();
    let mut client = connect(&host);

    let res = exchange(&mut client, Request::with_parameter(Command::Auth, "LOGIN"));
    assert_eq!(res.status, StatusCode::ServerChallenge);
    assert_eq!(res.lines, vec!["VXNlcm5hbWU="]);

    client.send_line(&base64::encode("user")).unwrap();
    let res = client.recv().unwrap();
    assert_eq!(res.status, StatusCode::ServerChallenge);
    assert_eq!(res.lines, vec!["UGFzc3dvcmQ="]);

    client.send_line(&base64::encode("secret")).unwrap();
    let res = client.recv().unwrap();
    assert_eq!(res.status, StatusCode::AuthenticationSucceeded);
    server.close(Timeout::new(Duration::from_secs(5)));
}

#[test]
fn auth_login_rejects_bad_credentials() {
    let (server, host) = serve();
    let mut client = connect(&host);

    exchange(&mut client, Request::with_parameter(Command::Auth, "LOGIN"));
    client.send_line(&base64::encode("user")).unwrap();
    client.recv().unwrap();
    client.send_line(&base64::encode("wrong")).unwrap();
    let res = client.recv().unwrap();
    assert_eq!(res.status, StatusCode::AuthenticationInvalid);
    server.close(Timeout::new(Duration::from_secs(5)));
}

#[test]
fn auth_plain_is_unsupported_by_default() {
    let (server, host) = serve();
    let mut client = connect(&host);

    let res = exchange(&mut client, Request::with_parameter(Command::Auth, "PLAIN dGVzdA=="));
    assert_eq!(res.status, StatusCode::ParameterNotImplemented);
    server.close(Timeout::new(Duration::from_secs(5)));
}

#[test]
fn unknown_command_gets_500_and_close() {
    let (server, host) = serve();
    let mut client = connect(&host);

    client.send_line("WHAT now").unwrap();
    let res = client.recv().unwrap();
    assert_eq!(res.status, StatusCode::SyntaxErrorCommand);

    // The server closes after the error reply.
    assert!(client.recv().is_err());
    server.close(Timeout::new(Duration::from_secs(5)));
}

#[test]
fn unhandled_verbs_answer_502() {
    let (server, host) = serve();
    let mut client = connect(&host);

    for command in &[Command::Send, Command::Soml, Command::Saml, Command::Turn] {
        let res = exchange(&mut client, Request::new(*command));
        assert_eq!(res.status, StatusCode::CommandNotImplemented);
    }
    let res = exchange(&mut client, Request::new(Command::Vrfy));
    assert_eq!(res.status, StatusCode::CannotVerify);
    let res = exchange(&mut client, Request::new(Command::Help));
    assert_eq!(res.status, StatusCode::HelpMessage);
    server.close(Timeout::new(Duration::from_secs(5)));
}
