//! Query the OCSP responders named in a certificate's AIA extension and
//! print the revocation status.
//!
//! Usage: ocsp_check <cert.der> <issuer.der>

use chrono::Utc;
use pagetrust::ocsp::request::build_link_requests;
use pagetrust::ocsp::response::OcspResponse;
use pagetrust::{HttpTransport, OcspConfig, OcspTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (cert_path, issuer_path) = match (args.next(), args.next()) {
        (Some(c), Some(i)) => (c, i),
        _ => {
            eprintln!("usage: ocsp_check <cert.der> <issuer.der>");
            std::process::exit(2);
        }
    };

    let cert = std::fs::read(&cert_path)?;
    let issuer = std::fs::read(&issuer_path)?;

    let requests = build_link_requests(&cert, &issuer, false)?;
    if requests.is_empty() {
        println!("certificate names no OCSP responder");
        return Ok(());
    }

    let config = OcspConfig::default();
    let transport = HttpTransport::new(&config)?;
    let now = Utc::now();

    for request in &requests {
        println!("querying {}", request.url);
        match transport.fetch(&request.url, &request.der).await {
            Ok(body) => match OcspResponse::parse(&body, &request.serial) {
                Ok(response) => {
                    println!("  status:      {:?}", response.status);
                    println!("  this update: {}", response.this_update.to_rfc3339());
                    if let Some(next) = response.next_update {
                        println!("  next update: {}", next.to_rfc3339());
                    }
                    println!("  fresh:       {}", response.is_fresh(now));
                    return Ok(());
                }
                Err(e) => eprintln!("  bad response: {}", e),
            },
            Err(e) => eprintln!("  fetch failed: {}", e),
        }
    }

    eprintln!("no responder returned a usable answer");
    std::process::exit(1);
}
