// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for the firmware update pipeline.

mod common;

use airctl_common::firmware::{
    download_and_verify, md5_hex, parse_board_id, read_board_id, read_remote_version,
    upgrade_firmware, verify_checksum, FirmwareError, UpdateStatus, UpgradeOptions,
    UpgradeOutcome,
};
use airctl_common::RemoteError;

use common::{CallKind, FakeShell, FakeSource};

const HOST: &str = "10.0.0.5";
const BOARD_INC: &str = "$board_name=\"NanoStation M5\";\n$board_id=\"0xe805\";\n$board_hwaddr=\"002722\";\n";
const IMAGE: &[u8] = b"XM.ar7240.v6.3.11.33396.230425.1742.bin";

fn device() -> FakeShell {
    FakeShell::new()
        .reply("cat /usr/lib/version", "XM.ar7240.v6.1.7.32555.180523.1508\n")
        .reply("cat /etc/board.inc", BOARD_INC)
}

fn status(update: &str) -> UpdateStatus {
    UpdateStatus {
        url: "http://dl.example.com/XM.v6.3.11.bin".to_string(),
        checksum: md5_hex(IMAGE),
        update: update.to_string(),
        version: "v6.3.11".to_string(),
        date: "230425".to_string(),
        security: "true".to_string(),
    }
}

// =============================================================================
// board id tests
// =============================================================================

#[test]
fn test_parse_board_id_simple() {
    assert_eq!(parse_board_id("$board_id=\"0x1234\";\n"), "0x1234");
}

#[test]
fn test_parse_board_id_among_other_lines() {
    assert_eq!(parse_board_id(BOARD_INC), "0xe805");
}

#[test]
fn test_parse_board_id_last_line_wins() {
    assert_eq!(
        parse_board_id("$board_id=\"0x0001\";\n$board_id=\"0x0002\";\n"),
        "0x0002"
    );
}

#[test]
fn test_parse_board_id_requires_line_prefix() {
    assert_eq!(parse_board_id("  $board_id=\"0x1234\";\n"), "");
}

// Known defect: a missing id is not an error and an empty
// sysid goes to the vendor.
#[test]
fn test_parse_board_id_missing_is_empty_not_error() {
    assert_eq!(parse_board_id("$board_name=\"NanoStation\";\n"), "");
    assert_eq!(parse_board_id(""), "");
}

#[test]
fn test_upgrade_sends_empty_board_id_when_missing() {
    let shell = FakeShell::new()
        .reply("cat /usr/lib/version", "v1\n")
        .reply("cat /etc/board.inc", "$board_name=\"x\";\n");
    let source = FakeSource::new(status("false"), Vec::new());

    upgrade_firmware(&shell, &source, HOST, UpgradeOptions::default()).unwrap();
    assert_eq!(source.calls(), vec!["check sysid= fwver=v1"]);
}

// =============================================================================
// status tests
// =============================================================================

#[test]
fn test_status_decodes_vendor_json() {
    let status: UpdateStatus = serde_json::from_str(
        r#"{"url":"http://x/fw.bin","checksum":"abc","update":"true","version":"v6","date":"2023","security":"false"}"#,
    )
    .unwrap();
    assert!(status.is_update_available());
    assert_eq!(status.url, "http://x/fw.bin");
    assert_eq!(status.security, "false");
}

#[test]
fn test_status_missing_fields_default_to_empty() {
    let status: UpdateStatus = serde_json::from_str(r#"{"update":"false"}"#).unwrap();
    assert!(!status.is_update_available());
    assert_eq!(status.url, "");
}

#[test]
fn test_only_literal_false_suppresses_update() {
    for update in ["true", "False", "FALSE", "no", "", "0"] {
        let status = UpdateStatus {
            update: update.to_string(),
            ..UpdateStatus::default()
        };
        assert!(status.is_update_available(), "{update:?}");
    }
}

// =============================================================================
// checksum tests
// =============================================================================

#[test]
fn test_md5_hex_known_vector() {
    assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
    assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
}

#[test]
fn test_verify_checksum_accepts_correct_digest() {
    assert!(verify_checksum(IMAGE, &md5_hex(IMAGE)).is_ok());
}

#[test]
fn test_verify_checksum_rejects_any_single_bit_flip() {
    let expected = md5_hex(IMAGE);
    for byte in 0..IMAGE.len() {
        for bit in 0..8 {
            let mut corrupted = IMAGE.to_vec();
            corrupted[byte] ^= 1 << bit;
            assert!(verify_checksum(&corrupted, &expected).is_err());
        }
    }
}

#[test]
fn test_verify_checksum_is_case_sensitive() {
    let upper = md5_hex(IMAGE).to_uppercase();
    let err = verify_checksum(IMAGE, &upper).unwrap_err();
    assert_eq!(err.expected, upper);
    assert_eq!(err.actual, md5_hex(IMAGE));
}

#[test]
fn test_download_and_verify_mismatch_names_url() {
    let source = FakeSource::new(status("true"), b"truncated".to_vec());
    let err = download_and_verify(&source, "http://x/fw.bin", &md5_hex(IMAGE)).unwrap_err();
    match err {
        FirmwareError::ChecksumMismatch { url, .. } => assert_eq!(url, "http://x/fw.bin"),
        other => panic!("unexpected error: {other}"),
    }
}

// =============================================================================
// remote read tests
// =============================================================================

#[test]
fn test_read_remote_version_trims_output() {
    let shell = device();
    assert_eq!(
        read_remote_version(&shell, HOST).unwrap(),
        "XM.ar7240.v6.1.7.32555.180523.1508"
    );
}

#[test]
fn test_read_remote_version_fails_on_exit_status() {
    let shell = FakeShell::new().fail("cat /usr/lib/version", 1);
    let err = read_remote_version(&shell, HOST).unwrap_err();
    assert!(matches!(err, RemoteError::Exit { code: Some(1), .. }));
}

#[test]
fn test_read_board_id_from_device() {
    let shell = device();
    assert_eq!(read_board_id(&shell, HOST).unwrap(), "0xe805");
}

// =============================================================================
// pipeline tests
// =============================================================================

#[test]
fn test_up_to_date_stops_after_check() {
    let shell = device();
    let source = FakeSource::new(status("false"), IMAGE.to_vec());

    let outcome = upgrade_firmware(&shell, &source, HOST, UpgradeOptions::default()).unwrap();

    assert_eq!(
        outcome,
        UpgradeOutcome::UpToDate {
            version: "XM.ar7240.v6.1.7.32555.180523.1508".to_string()
        }
    );
    assert_eq!(
        shell.commands(),
        vec!["cat /usr/lib/version", "cat /etc/board.inc"]
    );
    assert_eq!(
        source.calls(),
        vec!["check sysid=0xe805 fwver=XM.ar7240.v6.1.7.32555.180523.1508"]
    );
}

#[test]
fn test_update_is_downloaded_uploaded_and_applied() {
    let shell = device()
        .reply("cat >/tmp/fwupdate.bin", "")
        .reply("/sbin/fwupdate -m", "");
    let source = FakeSource::new(status("true"), IMAGE.to_vec());

    let outcome = upgrade_firmware(&shell, &source, HOST, UpgradeOptions::default()).unwrap();

    assert_eq!(
        outcome,
        UpgradeOutcome::Applied {
            from: "XM.ar7240.v6.1.7.32555.180523.1508".to_string(),
            to: "v6.3.11".to_string(),
        }
    );
    assert_eq!(source.calls()[1], "download http://dl.example.com/XM.v6.3.11.bin");

    let calls = shell.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[2].kind, CallKind::Input);
    assert_eq!(calls[2].command, "cat >/tmp/fwupdate.bin");
    assert_eq!(calls[2].input.as_deref(), Some(IMAGE));
    assert_eq!(calls[3].command, "/sbin/fwupdate -m");
    assert!(calls.iter().all(|c| c.host == HOST));
}

#[test]
fn test_checksum_mismatch_uploads_nothing() {
    let shell = device();
    let mut bad = status("true");
    bad.checksum = md5_hex(b"something else");
    let source = FakeSource::new(bad, IMAGE.to_vec());

    let err = upgrade_firmware(&shell, &source, HOST, UpgradeOptions::default()).unwrap_err();

    assert!(matches!(err, FirmwareError::ChecksumMismatch { .. }));
    assert_eq!(shell.calls().len(), 2);
}

#[test]
fn test_check_only_reports_available_update() {
    let shell = device();
    let source = FakeSource::new(status("true"), IMAGE.to_vec());

    let outcome =
        upgrade_firmware(&shell, &source, HOST, UpgradeOptions { check_only: true }).unwrap();

    assert_eq!(outcome, UpgradeOutcome::Available(status("true")));
    assert_eq!(source.calls().len(), 1);
    assert_eq!(shell.calls().len(), 2);
}

#[test]
fn test_upload_failure_skips_apply() {
    let shell = device().fail("cat >/tmp/fwupdate.bin", 1);
    let source = FakeSource::new(status("true"), IMAGE.to_vec());

    let err = upgrade_firmware(&shell, &source, HOST, UpgradeOptions::default()).unwrap_err();

    assert!(matches!(err, FirmwareError::Remote(RemoteError::Exit { .. })));
    assert!(!shell.commands().iter().any(|c| c == "/sbin/fwupdate -m"));
}

#[test]
fn test_apply_failure_is_not_retried() {
    let shell = device()
        .reply("cat >/tmp/fwupdate.bin", "")
        .fail("/sbin/fwupdate -m", 2);
    let source = FakeSource::new(status("true"), IMAGE.to_vec());

    assert!(upgrade_firmware(&shell, &source, HOST, UpgradeOptions::default()).is_err());
    let applies = shell
        .commands()
        .iter()
        .filter(|c| *c == "/sbin/fwupdate -m")
        .count();
    assert_eq!(applies, 1);
}

#[test]
fn test_version_read_failure_aborts_before_check() {
    let shell = FakeShell::new();
    let source = FakeSource::new(status("true"), IMAGE.to_vec());

    assert!(upgrade_firmware(&shell, &source, HOST, UpgradeOptions::default()).is_err());
    assert!(source.calls().is_empty());
}
