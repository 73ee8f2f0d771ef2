//! End-to-end behavior of the audit log over the file and SQLite stores.

use chrono::{Duration, TimeZone, Utc};
use portal_audit_core::{
    AccessEvent, AuditLog, Cipher, CipherKey, Config, ConfidentialValue, SchemaVersion,
    SearchField, Visibility, DEFAULT_KEY_SALT,
};
use portal_audit_storage::{
    ip_fingerprint, mac_fingerprint, FileStore, LogStore, MemoryStore, SqliteStore, StoredRecord,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;

fn cipher() -> Arc<Cipher> {
    let key = CipherKey::derive(b"integration secret", DEFAULT_KEY_SALT, 1_000).unwrap();
    Arc::new(Cipher::new(&key))
}

fn file_log(dir: &TempDir, cipher: Arc<Cipher>) -> AuditLog {
    let store = FileStore::open(&dir.path().join("access_log.json")).unwrap();
    AuditLog::new(Arc::new(store), cipher, Config::default()).unwrap()
}

fn sqlite_log(dir: &TempDir, cipher: Arc<Cipher>) -> AuditLog {
    let store = SqliteStore::open(&dir.path().join("audit.db")).unwrap();
    AuditLog::new(Arc::new(store), cipher, Config::default()).unwrap()
}

/// One log per backend, each in its own directory.
fn logs(cipher: &Arc<Cipher>) -> Vec<(AuditLog, TempDir)> {
    let file_dir = tempfile::tempdir().unwrap();
    let db_dir = tempfile::tempdir().unwrap();
    vec![
        (file_log(&file_dir, Arc::clone(cipher)), file_dir),
        (sqlite_log(&db_dir, Arc::clone(cipher)), db_dir),
    ]
}

fn read_raw(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn name_and_email_never_stored_in_clear() {
    let dir = tempfile::tempdir().unwrap();
    let log = file_log(&dir, cipher());
    log.append(
        &AccessEvent::new("José Silva", "jose.silva@example.org")
            .with_ip("192.168.1.100")
            .with_mac("AA:BB:CC:DD:EE:FF"),
    )
    .unwrap();

    let raw = read_raw(&dir.path().join("access_log.json"));
    assert!(!raw.contains("José"));
    assert!(!raw.contains("jose.silva@example.org"));
    assert!(raw.contains("192.168.1.100"));

    let entries: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_ne!(entry["name"], "José Silva");
    assert_eq!(entry["schema_version"], 2);
    assert_eq!(entry["ip_fingerprint"].as_str().unwrap().len(), 64);
    assert!(entry.get("phone").is_none());
}

#[test]
fn sqlite_columns_hold_ciphertext() {
    let dir = tempfile::tempdir().unwrap();
    let log = sqlite_log(&dir, cipher());
    log.append(&AccessEvent::new("Maria Souza", "maria@example.org"))
        .unwrap();

    let stored = log.store().list_recent(1).unwrap().remove(0);
    assert_ne!(stored.name.as_str(), "Maria Souza");
    assert_ne!(stored.email.as_str(), "maria@example.org");

    let revealed = log.list_recent(1, Visibility::Reveal).unwrap().remove(0);
    assert_eq!(revealed.name.clear(), Some("Maria Souza"));
}

#[test]
fn confidential_search_finds_accented_name() {
    let cipher = cipher();
    for (log, _dir) in logs(&cipher) {
        log.append(&AccessEvent::new("José Silva", "jose@example.org"))
            .unwrap();
        log.append(&AccessEvent::new("Ana Lima", "ana@example.org"))
            .unwrap();

        let hits = log
            .search_named("José", "nome", Visibility::Reveal)
            .unwrap();
        let kind = log.store().kind();
        assert_eq!(hits.len(), 1, "{kind}");
        assert_eq!(hits[0].name.clear(), Some("José Silva"));

        let hits = log.search_named("silva", "name", Visibility::Redact).unwrap();
        assert_eq!(hits.len(), 1, "{kind}");
        assert_eq!(hits[0].name, ConfidentialValue::Redacted);

        assert!(log
            .search_named("", "nome", Visibility::Reveal)
            .unwrap()
            .is_empty());
    }
}

/// Builds `count` stored records through the codec, without a store.
fn filler(log: &AuditLog, count: usize) -> Vec<StoredRecord> {
    let base = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let event = AccessEvent::new(format!("Visitor {i}"), format!("v{i}@example.org"))
                .with_ip(format!("10.{}.{}.{}", i / 65536, (i / 256) % 256, i % 256))
                .with_timestamp(base + Duration::seconds(i as i64));
            let id = portal_audit_core::AccessId::from_stored(format!("filler_{i:06}"));
            log.codec().to_storage(&event, &id).unwrap()
        })
        .collect()
}

#[test]
fn plain_search_with_many_unrelated_records() {
    let cipher = cipher();

    // File store seeded by writing the array directly
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access_log.json");
    let file = file_log(&dir, Arc::clone(&cipher));
    let records = filler(&file, 1_500);
    std::fs::write(&path, serde_json::to_vec(&records).unwrap()).unwrap();

    // SQLite store seeded by import
    let sqlite = AuditLog::new(
        Arc::new(SqliteStore::open_in_memory().unwrap()),
        Arc::clone(&cipher),
        Config::default(),
    )
    .unwrap();
    let seed = MemoryStore::new();
    for record in &records {
        seed.append(record).unwrap();
    }
    sqlite.import_from(&seed).unwrap();

    for log in [&file, &sqlite] {
        log.append(&AccessEvent::new("Target", "t@example.org").with_ip("192.168.1.100"))
            .unwrap();

        let started = Instant::now();
        let hits = log
            .search("192.168", SearchField::Ip, Visibility::Reveal)
            .unwrap();
        let elapsed = started.elapsed();

        let kind = log.store().kind();
        assert_eq!(hits.len(), 1, "{kind}");
        assert_eq!(hits[0].ip.as_deref(), Some("192.168.1.100"));
        assert_eq!(hits[0].name.clear(), Some("Target"));
        assert!(elapsed.as_secs_f64() < 1.0, "{kind} took {elapsed:?}");

        let capped = log.search("10.", SearchField::Ip, Visibility::Redact).unwrap();
        assert_eq!(capped.len(), 1_000, "{kind}");
        assert_eq!(log.store().count().unwrap(), 1_501);
    }
}

#[test]
fn stats_distinct_ips_and_macs() {
    let cipher = cipher();
    let now = Utc.with_ymd_and_hms(2026, 10, 14, 18, 0, 0).unwrap();
    for (log, _dir) in logs(&cipher) {
        for (ip, mac, hours_ago) in [
            ("203.0.113.10", "AA:BB:CC:00:00:01", 1),
            ("203.0.113.10", "AA:BB:CC:00:00:01", 30),
            ("203.0.113.20", "AA:BB:CC:00:00:02", 24 * 8),
        ] {
            log.append(
                &AccessEvent::new("V", "v@example.org")
                    .with_ip(ip)
                    .with_mac(mac)
                    .with_timestamp(now - Duration::hours(hours_ago)),
            )
            .unwrap();
        }
        log.append(
            &AccessEvent::new("No Mac", "n@example.org")
                .with_ip("203.0.113.20")
                .with_timestamp(now - Duration::hours(2)),
        )
        .unwrap();

        let stats = log.stats_at(now);
        let kind = log.store().kind();
        assert_eq!(stats.error, None, "{kind}");
        assert_eq!(stats.total_accesses, 4, "{kind}");
        assert_eq!(stats.unique_ips, 2, "{kind}");
        assert_eq!(stats.unique_macs, 2, "{kind}");
        assert_eq!(stats.today_accesses, 2, "{kind}");
        assert_eq!(stats.this_week_accesses, 3, "{kind}");
    }
}

#[test]
fn corrupt_file_reads_empty_and_accepts_appends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access_log.json");
    std::fs::write(&path, "[{\"access_id\": \"trunc").unwrap();

    let log = file_log(&dir, cipher());
    assert!(log.list_recent(10, Visibility::Reveal).unwrap().is_empty());
    assert_eq!(log.stats().total_accesses, 0);

    log.append(&AccessEvent::new("Ana", "ana@example.org")).unwrap();
    let records = log.list_recent(10, Visibility::Reveal).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name.clear(), Some("Ana"));

    let entries: Vec<serde_json::Value> = serde_json::from_str(&read_raw(&path)).unwrap();
    assert_eq!(entries.len(), 1);
}

#[test]
fn no_key_stores_and_reads_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let log = file_log(&dir, Arc::new(Cipher::disabled()));
    log.append(&AccessEvent::new("Ana Clara", "ana@example.org"))
        .unwrap();

    let raw = read_raw(&dir.path().join("access_log.json"));
    assert!(raw.contains("Ana Clara"));

    let records = log.list_recent(1, Visibility::Reveal).unwrap();
    assert_eq!(records[0].name, ConfidentialValue::Clear("Ana Clara".into()));
    assert_eq!(
        log.search_named("clara", "name", Visibility::Reveal)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn changed_key_degrades_to_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    file_log(&dir, cipher())
        .append(&AccessEvent::new("Ana", "ana@example.org"))
        .unwrap();

    let other = CipherKey::derive(b"rotated secret", DEFAULT_KEY_SALT, 1_000).unwrap();
    let log = file_log(&dir, Arc::new(Cipher::new(&other)));
    let records = log.list_recent(10, Visibility::Reveal).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].name.is_unreadable());
    assert!(records[0].name.display_text().starts_with("enc1:"));
}

#[test]
fn legacy_records_read_as_v1() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access_log.json");
    let cipher = cipher();
    let legacy = serde_json::json!([{
        "access_id": "20240301101500_a1b2c3d4e5f60718",
        "timestamp": "2024-03-01T10:15:00.123456",
        "nome": cipher.encrypt("Antônio Prado").unwrap(),
        "email": cipher.encrypt("antonio@example.org").unwrap(),
        "telefone": cipher.encrypt("+55 21 98765-4321").unwrap(),
        "data_nascimento": cipher.encrypt("1980-12-24").unwrap(),
        "ip": "172.16.0.9",
        "ip_hash": "",
        "mac": "",
        "mac_hash": "",
        "user_agent": "Mozilla/5.0 (Linux; Android 10)"
    }]);
    std::fs::write(&path, serde_json::to_vec_pretty(&legacy).unwrap()).unwrap();

    let log = file_log(&dir, Arc::clone(&cipher));
    let record = log.list_recent(10, Visibility::Reveal).unwrap().remove(0);
    assert_eq!(record.schema_version, 1);
    assert_eq!(record.name.clear(), Some("Antônio Prado"));
    assert_eq!(
        record.phone.as_ref().and_then(ConfidentialValue::clear),
        Some("+55 21 98765-4321")
    );
    assert_eq!(record.ip_fingerprint, ip_fingerprint("172.16.0.9"));
    assert_eq!(record.mac, None);
    assert_eq!(record.mac_fingerprint, None);
    assert_eq!(
        record.timestamp,
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap()
            + Duration::microseconds(123_456)
    );

    let map = record.to_field_map();
    assert_eq!(map["date"], "2024-03-01");
    assert_eq!(map["time"], "10:15:00");
    assert_eq!(map["birth_date"], "1980-12-24");

    let hits = log
        .search_named("98765", "telefone", Visibility::Reveal)
        .unwrap();
    assert_eq!(hits.len(), 1);

    // Appends keep going under the configured schema
    log.append(&AccessEvent::new("Nova", "nova@example.org").with_phone("123"))
        .unwrap();
    let newest = log.list_recent(1, Visibility::Reveal).unwrap().remove(0);
    assert_eq!(newest.schema_version, SchemaVersion::V2.as_u32());
    assert!(newest.phone.is_none());
}

#[test]
fn import_json_file_into_sqlite() {
    let cipher = cipher();
    let file_dir = tempfile::tempdir().unwrap();
    let source = file_log(&file_dir, Arc::clone(&cipher));
    let t = Utc.with_ymd_and_hms(2026, 10, 10, 12, 0, 0).unwrap();
    for (i, name) in ["Ana", "Bruno", "Carla"].into_iter().enumerate() {
        source
            .append(
                &AccessEvent::new(name, format!("{}@example.org", name.to_lowercase()))
                    .with_ip(format!("10.0.0.{i}"))
                    .with_timestamp(t + Duration::minutes(i as i64)),
            )
            .unwrap();
    }

    let db_dir = tempfile::tempdir().unwrap();
    let target = sqlite_log(&db_dir, Arc::clone(&cipher));
    let report = target.import_from(source.store()).unwrap();
    assert_eq!(report.imported, 3);

    let names: Vec<_> = target
        .list_recent(10, Visibility::Reveal)
        .unwrap()
        .into_iter()
        .map(|r| r.name.display_text().to_string())
        .collect();
    assert_eq!(names, vec!["Carla", "Bruno", "Ana"]);
    assert_eq!(target.stats_at(t).unique_ips, 3);

    let rerun = target.import_from(source.store()).unwrap();
    assert_eq!((rerun.imported, rerun.skipped), (0, 3));
}

/// Writes a JSON log file holding records from before encryption and
/// canonical fingerprints: name and email in clear, hashes of the raw
/// address spelling.
fn write_pre_encryption_log(path: &Path) {
    let legacy = serde_json::json!([{
        "access_id": "20240301101500_0f1e2d3c4b5a6978",
        "timestamp": "2024-03-01T10:15:00.000000",
        "nome": "José Silva",
        "email": "jose.silva@example.org",
        "ip": "10.0.0.5",
        "ip_hash": "",
        "mac": "AA:BB:CC:DD:EE:FF",
        "mac_hash": portal_audit_core::fingerprint("AA:BB:CC:DD:EE:FF"),
        "user_agent": "Mozilla/5.0"
    }]);
    std::fs::write(path, serde_json::to_vec_pretty(&legacy).unwrap()).unwrap();
}

#[test]
fn plaintext_legacy_records_stay_searchable() {
    let dir = tempfile::tempdir().unwrap();
    write_pre_encryption_log(&dir.path().join("access_log.json"));
    let log = file_log(&dir, cipher());

    let listed = log.list_recent(10, Visibility::Reveal).unwrap();
    assert_eq!(listed[0].name.display_text(), "José Silva");

    let by_name = log.search_named("José", "nome", Visibility::Reveal).unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].name.display_text(), "José Silva");

    let by_email = log.search_named("JOSE.SILVA@", "email", Visibility::Reveal).unwrap();
    assert_eq!(by_email.len(), 1);
}

#[test]
fn legacy_and_new_records_share_fingerprints() {
    let dir = tempfile::tempdir().unwrap();
    write_pre_encryption_log(&dir.path().join("access_log.json"));
    let log = file_log(&dir, cipher());
    log.append(
        &AccessEvent::new("Maria", "maria@example.org")
            .with_ip("10.0.0.5")
            .with_mac("aa-bb-cc-dd-ee-ff"),
    )
    .unwrap();

    let stats = log.stats();
    assert_eq!(stats.total_accesses, 2);
    assert_eq!(stats.unique_ips, 1);
    assert_eq!(stats.unique_macs, 1);

    let legacy = log
        .list_recent(10, Visibility::Reveal)
        .unwrap()
        .into_iter()
        .find(|r| r.schema_version == 1)
        .unwrap();
    assert_eq!(legacy.mac_fingerprint, mac_fingerprint("aa:bb:cc:dd:ee:ff"));

    let db_dir = tempfile::tempdir().unwrap();
    let target = sqlite_log(&db_dir, cipher());
    assert_eq!(target.import_from(log.store()).unwrap().imported, 2);
    let imported = target.stats();
    assert_eq!(imported.total_accesses, 2);
    assert_eq!(imported.unique_ips, 1);
    assert_eq!(imported.unique_macs, 1);
}
