//! Human and machine readable rendering of a status response

use ocsp_proto::{CertificateStatus, StatusResponse};
use std::fmt::{self, Write};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Multi-line text report
pub fn render_text(response: &StatusResponse) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_text(&mut out, response);
    out
}

fn write_text(out: &mut String, response: &StatusResponse) -> fmt::Result {
    let status = match response.status {
        CertificateStatus::Good => "GOOD",
        CertificateStatus::Revoked { .. } => "REVOKED",
        CertificateStatus::Unknown => "UNKNOWN",
    };

    writeln!(out, "Status:        {}", status)?;
    writeln!(
        out,
        "Serial:        {} ({})",
        response.serial_number,
        response.serial_number.to_hex()
    )?;
    writeln!(out, "This update:   {}", response.this_update.format(TIME_FORMAT))?;
    match response.next_update {
        Some(next_update) => writeln!(out, "Next update:   {}", next_update.format(TIME_FORMAT))?,
        None => writeln!(out, "Next update:   (not provided)")?,
    }
    writeln!(out, "Produced at:   {}", response.produced_at.format(TIME_FORMAT))?;

    if let CertificateStatus::Revoked { revoked_at, reason } = &response.status {
        writeln!(out, "Revoked at:    {}", revoked_at.format(TIME_FORMAT))?;
        match reason {
            Some(reason) => writeln!(out, "Reason:        {}", reason)?,
            None => writeln!(out, "Reason:        (not provided)")?,
        }
    }

    if let Some(url) = &response.responder_url {
        writeln!(out, "Responder:     {}", url)?;
    }
    let nonce = if response.nonce_verified {
        "verified"
    } else {
        "not verified"
    };
    writeln!(out, "Nonce:         {}", nonce)
}

/// Pretty-printed JSON report
pub fn render_json(response: &StatusResponse) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(response)
}
