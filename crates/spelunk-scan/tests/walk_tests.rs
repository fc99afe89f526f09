use std::path::{Path, PathBuf};

use spelunk_core::NameCheck;
use spelunk_scan::{
    ErrorSink, EventLog, LastError, MemFs, ScanConfig, ScanError, ScanEvent, ScanOutcome,
    ScanPhase, Scanner, SizeMode, TreeBuilder, WalkStatus,
};

fn scan(fs: &mut MemFs, config: &ScanConfig) -> (EventLog, LastError, ScanOutcome) {
    let mut log = EventLog::new();
    let mut errors = LastError::new();
    let outcome = Scanner::new()
        .scan(fs, config, &mut log, &mut errors)
        .unwrap();
    (log, errors, outcome)
}

/// Render events as short strings for order assertions.
fn trace(log: &EventLog) -> Vec<String> {
    log.events
        .iter()
        .map(|event| match event {
            ScanEvent::Open(e) => format!("open {}", e.name),
            ScanEvent::Leaf(e) => format!("leaf {}", e.name),
            ScanEvent::Close => "close".to_string(),
        })
        .collect()
}

#[test]
fn test_small_tree_event_order() {
    let mut fs = MemFs::new("/r");
    fs.file("a", 4096).dir("b").file("c", 9000);

    let config = ScanConfig::builder()
        .root("/r")
        .exclude_patterns(vec!["c".to_string()])
        .build()
        .unwrap();
    let (log, _, outcome) = scan(&mut fs, &config);

    assert_eq!(
        trace(&log),
        vec!["open /r", "leaf a", "open b", "close", "leaf c", "close"]
    );
    assert_eq!(log.finalized, Some(false));
    assert_eq!(outcome.status, WalkStatus::Ok);
    assert!(outcome.continue_host);

    let a = log.find("a").unwrap();
    assert!(a.flags.is_file);
    assert_eq!(a.size_apparent, 4096);
    assert_eq!(a.size_on_disk, 4096);

    let c = log.find("c").unwrap();
    assert!(c.flags.excluded);
    assert_eq!(c.size_on_disk, 0);
    assert_eq!(c.size_apparent, 0);

    let root = log.find("/r").unwrap();
    assert!(root.flags.is_dir);
    assert!(!root.flags.other_filesystem);
}

#[test]
fn test_partial_listing_keeps_collected_names() {
    let mut fs = MemFs::new("/r");
    for name in ["n1", "n2", "n3", "n4", "n5"] {
        fs.file(&format!("d/{name}"), 10);
    }
    fs.file("z", 10);
    fs.fail_read_after("d", 2);

    let (log, errors, outcome) = scan(&mut fs, &ScanConfig::new("/r"));

    assert_eq!(
        trace(&log),
        vec![
            "open /r", "open d", "leaf n1", "leaf n2", "close", "leaf z", "close"
        ]
    );
    assert!(log.find("d").unwrap().flags.error);
    assert!(log.find("d").unwrap().flags.is_dir);
    assert_eq!(log.finalized, Some(false));
    assert_eq!(outcome.status, WalkStatus::Recovered);
    assert_eq!(errors.last(), Some(Path::new("/r/d")));
    assert_eq!(fs.position(), PathBuf::from("/r"));
}

#[test]
fn test_failed_return_is_fatal() {
    let mut fs = MemFs::new("/r");
    fs.file("e/inside", 10).dir("f/deeper").file("g", 1);
    fs.fail_leave("e");

    let (log, _, outcome) = scan(&mut fs, &ScanConfig::new("/r"));

    assert_eq!(log.finalized, Some(true));
    assert!(outcome.is_fatal());
    assert!(log.is_balanced());
    assert!(log.find("inside").is_some());
    assert!(log.find("f").is_none());
    assert!(log.find("g").is_none());
    match outcome.fatal_error {
        Some(ScanError::PositionLost { ref path, .. }) => {
            assert_eq!(path, &PathBuf::from("/r/e"));
        }
        ref other => panic!("expected PositionLost, got {other:?}"),
    }
}

#[test]
fn test_fatal_deep_in_tree_stops_everything() {
    let mut fs = MemFs::new("/r");
    fs.file("x/a/f", 1).file("x/y/f", 1).file("x/z/f", 1).file("w", 1);
    fs.fail_leave("x/y");

    let (log, _, outcome) = scan(&mut fs, &ScanConfig::new("/r"));

    assert!(outcome.is_fatal());
    assert!(log.is_balanced());
    assert_eq!(log.opens(), 4);
    assert!(log.find("z").is_none());
    assert!(log.find("w").is_none());
    // Only the return from x/a succeeded; nothing was attempted afterwards.
    assert_eq!(fs.leaves(), 1);
    assert_eq!(fs.position(), PathBuf::from("/r/x/y"));
}

#[test]
fn test_fatal_when_return_fails_after_open_error() {
    let mut fs = MemFs::new("/r");
    fs.file("locked/f", 1).file("after", 1);
    fs.fail_open("locked").fail_leave("locked");

    let (log, _, outcome) = scan(&mut fs, &ScanConfig::new("/r"));

    assert!(outcome.is_fatal());
    assert_eq!(
        trace(&log),
        vec!["open /r", "open locked", "close", "close"]
    );
    assert!(log.find("locked").unwrap().flags.error);
}

#[test]
fn test_excluded_directory_is_not_descended() {
    let mut fs = MemFs::new("/r");
    fs.file("skip/big", 1 << 20).file("skip/sub/more", 1 << 20).file("keep", 1);

    let config = ScanConfig::builder()
        .root("/r")
        .exclude_patterns(vec!["/r/skip".to_string()])
        .build()
        .unwrap();
    let (log, _, _) = scan(&mut fs, &config);

    assert_eq!(
        trace(&log),
        vec!["open /r", "open skip", "close", "leaf keep", "close"]
    );
    let skip = log.find("skip").unwrap();
    assert!(skip.flags.excluded);
    assert!(skip.is_dir());
    assert_eq!(skip.size_on_disk, 0);
}

#[test]
fn test_other_filesystem_policy() {
    let mut fs = MemFs::new("/r");
    fs.dir("mnt").set_device("mnt", 2).file("mnt/x", 100).file("local", 1);

    let strict = ScanConfig::builder()
        .root("/r")
        .same_filesystem(true)
        .build()
        .unwrap();
    let (log, _, _) = scan(&mut fs, &strict);
    let mnt = log.find("mnt").unwrap();
    assert!(mnt.flags.other_filesystem);
    assert_eq!(mnt.size_on_disk, 0);
    assert_eq!(mnt.size_apparent, 0);
    assert!(log.find("x").is_none());
    assert!(!log.find("local").unwrap().flags.other_filesystem);

    let (log, _, _) = scan(&mut fs, &ScanConfig::new("/r"));
    assert!(!log.find("mnt").unwrap().flags.other_filesystem);
    assert_eq!(log.find("x").unwrap().size_apparent, 100);
}

#[test]
fn test_root_never_other_filesystem() {
    let mut fs = MemFs::new("/r");
    fs.set_device("", 9).file("a", 1).set_device("a", 9);

    let strict = ScanConfig::builder()
        .root("/r")
        .same_filesystem(true)
        .build()
        .unwrap();
    let (log, _, _) = scan(&mut fs, &strict);
    assert!(!log.find("/r").unwrap().flags.other_filesystem);
    assert!(!log.find("a").unwrap().flags.other_filesystem);
}

#[test]
fn test_hard_link_candidates() {
    let mut fs = MemFs::new("/r");
    fs.file("two", 10).set_links("two", 2);
    fs.file("one", 10);
    fs.dir("dir").set_links("dir", 5);

    let (log, _, _) = scan(&mut fs, &ScanConfig::new("/r"));
    assert!(log.find("two").unwrap().flags.hard_link_candidate);
    assert!(!log.find("one").unwrap().flags.hard_link_candidate);
    assert!(!log.find("dir").unwrap().flags.hard_link_candidate);
}

#[test]
fn test_stat_failure_is_untyped_leaf() {
    let mut fs = MemFs::new("/r");
    fs.dir("broken").file("broken/child", 1).fail_stat("broken");

    let (log, errors, outcome) = scan(&mut fs, &ScanConfig::new("/r"));
    assert_eq!(trace(&log), vec!["open /r", "leaf broken", "close"]);

    let broken = log.find("broken").unwrap();
    assert!(broken.flags.error);
    assert!(!broken.flags.is_dir && !broken.flags.is_file);
    assert_eq!(broken.size_on_disk, 0);
    assert_eq!(errors.last(), Some(Path::new("/r/broken")));
    assert_eq!(outcome.status, WalkStatus::Recovered);
}

#[test]
fn test_stat_failure_of_excluded_entry_is_quiet() {
    let mut fs = MemFs::new("/r");
    fs.file("noisy.tmp", 10).fail_stat("noisy.tmp");

    let config = ScanConfig::builder()
        .root("/r")
        .exclude_patterns(vec!["*.tmp".to_string()])
        .build()
        .unwrap();
    let (log, errors, outcome) = scan(&mut fs, &config);
    assert_eq!(trace(&log), vec!["open /r", "leaf noisy.tmp", "close"]);

    let noisy = log.find("noisy.tmp").unwrap();
    assert!(noisy.flags.excluded);
    assert!(!noisy.flags.error);
    assert!(!noisy.is_dir() && !noisy.is_file());
    assert_eq!(noisy.size_on_disk, 0);
    assert!(errors.last().is_none());
    assert_eq!(errors.count(), 0);
    assert_eq!(outcome.status, WalkStatus::Ok);
}

#[test]
fn test_enter_failure_stays_in_place() {
    let mut fs = MemFs::new("/r");
    fs.file("locked/f", 1).file("next", 1).fail_enter("locked");

    let (log, _, outcome) = scan(&mut fs, &ScanConfig::new("/r"));
    assert_eq!(
        trace(&log),
        vec!["open /r", "open locked", "close", "leaf next", "close"]
    );
    assert!(log.find("locked").unwrap().flags.error);
    assert_eq!(fs.leaves(), 0);
    assert_eq!(outcome.status, WalkStatus::Recovered);
}

#[test]
fn test_open_failure_returns_to_parent() {
    let mut fs = MemFs::new("/r");
    fs.file("noread/f", 1).file("next", 1).fail_open("noread");

    let (log, _, outcome) = scan(&mut fs, &ScanConfig::new("/r"));
    assert_eq!(
        trace(&log),
        vec!["open /r", "open noread", "close", "leaf next", "close"]
    );
    assert_eq!(fs.leaves(), 1);
    assert_eq!(fs.position(), PathBuf::from("/r"));
    assert!(!outcome.is_fatal());
}

#[test]
fn test_rejected_name_is_not_touched() {
    let mut fs = MemFs::new("/r");
    fs.file("HKEY\\Software/inner", 1).file("fine", 1);

    let config = ScanConfig::builder()
        .root("/r")
        .name_check(NameCheck::Reject(vec!['/', '\\']))
        .build()
        .unwrap();
    let (log, errors, _) = scan(&mut fs, &config);

    assert_eq!(
        trace(&log),
        vec!["open /r", "leaf HKEY\\Software", "leaf fine", "close"]
    );
    let odd = log.find("HKEY\\Software").unwrap();
    assert!(odd.flags.error);
    assert!(!odd.flags.is_dir);
    assert_eq!(errors.count(), 1);
}

#[test]
fn test_symlinks_and_specials_are_untyped_leaves() {
    let mut fs = MemFs::new("/r");
    fs.symlink("link").special("fifo");

    let (log, _, _) = scan(&mut fs, &ScanConfig::new("/r"));
    for name in ["link", "fifo"] {
        let entry = log.find(name).unwrap();
        assert!(!entry.flags.is_file && !entry.flags.is_dir && !entry.flags.error);
        assert_ne!(entry.inode, 0);
    }
    assert_eq!(log.find("link").unwrap().size_apparent, 12);
}

#[test]
fn test_one_listing_handle_at_a_time() {
    let mut fs = MemFs::new("/r");
    fs.file("a/b/c/d/e/f/g/leaf", 1)
        .file("a/b/side/x", 1)
        .file("a/other/y", 1);

    let (log, _, _) = scan(&mut fs, &ScanConfig::new("/r"));
    assert!(log.is_balanced());
    assert_eq!(fs.max_open_listings(), 1);
    assert_eq!(fs.open_listings(), 0);
    assert_eq!(fs.position(), PathBuf::from("/r"));
}

#[test]
fn test_streams_stay_balanced_under_every_fault() {
    type Fault = fn(&mut MemFs, &str);
    let faults: [Fault; 6] = [
        |fs, p| {
            fs.fail_stat(p);
        },
        |fs, p| {
            fs.fail_enter(p);
        },
        |fs, p| {
            fs.fail_open(p);
        },
        |fs, p| {
            fs.fail_read_after(p, 1);
        },
        |fs, p| {
            fs.fail_close(p);
        },
        |fs, p| {
            fs.fail_leave(p);
        },
    ];
    let dirs = ["a", "a/b", "a/b/c", "d"];

    for fault in faults {
        for dir in dirs {
            let mut fs = MemFs::new("/r");
            fs.file("a/b/c/f1", 1)
                .file("a/b/f2", 1)
                .file("a/f3", 1)
                .file("d/f4", 1)
                .file("top", 1);
            fault(&mut fs, dir);

            let (log, _, outcome) = scan(&mut fs, &ScanConfig::new("/r"));
            assert!(log.is_balanced(), "unbalanced with fault on {dir}");
            assert_eq!(log.finalized, Some(outcome.is_fatal()));
            for entry in log.events.iter().filter_map(ScanEvent::entry) {
                assert!(!(entry.flags.is_file && entry.flags.is_dir));
                if !entry.flags.counts_size() {
                    assert_eq!(entry.size_on_disk, 0);
                }
            }
        }
    }
}

#[test]
fn test_root_configuration_errors() {
    let mut fs = MemFs::new("/r");
    fs.file("f", 1);
    let mut log = EventLog::new();
    let scanner = Scanner::new();

    let err = scanner
        .scan(&mut fs, &ScanConfig::new("/r/f"), &mut log, &mut LastError::new())
        .unwrap_err();
    assert!(matches!(err, ScanError::NotADirectory { .. }));

    let err = scanner
        .scan(&mut fs, &ScanConfig::new("/missing"), &mut log, &mut LastError::new())
        .unwrap_err();
    assert!(matches!(err, ScanError::NotFound { .. }));

    let bad = ScanConfig::builder()
        .root("/r")
        .exclude_patterns(vec!["[".to_string()])
        .build()
        .unwrap();
    let err = scanner
        .scan(&mut fs, &bad, &mut log, &mut LastError::new())
        .unwrap_err();
    assert!(matches!(err, ScanError::InvalidPattern { .. }));

    assert!(log.events.is_empty());
    assert!(log.finalized.is_none());
}

#[test]
fn test_root_listing_failures() {
    let mut fs = MemFs::new("/r");
    fs.file("a", 1).file("b", 1).fail_read_after("", 1);
    let (log, errors, outcome) = scan(&mut fs, &ScanConfig::new("/r"));
    assert_eq!(trace(&log), vec!["open /r", "leaf a", "close"]);
    assert!(log.find("/r").unwrap().flags.error);
    assert_eq!(errors.last(), Some(Path::new("/r")));
    assert_eq!(outcome.status, WalkStatus::Recovered);

    let mut fs = MemFs::new("/r");
    fs.file("a", 1).fail_open("");
    let (log, _, outcome) = scan(&mut fs, &ScanConfig::new("/r"));
    assert_eq!(trace(&log), vec!["open /r", "close"]);
    assert_eq!(log.finalized, Some(false));
    assert!(!outcome.is_fatal());
}

#[test]
fn test_relative_root_is_canonicalized() {
    let mut fs = MemFs::new("/r");
    fs.file("sub/f", 1);
    let (log, _, _) = scan(&mut fs, &ScanConfig::new("sub/."));
    assert_eq!(trace(&log), vec!["open /r/sub", "leaf f", "close"]);
}

#[test]
fn test_error_sink_reset_and_phase() {
    let mut fs = MemFs::new("/r");
    fs.file("a", 1);
    let mut errors = LastError::new();
    errors.record(Path::new("/stale"));

    let mut log = EventLog::new();
    Scanner::new()
        .scan(&mut fs, &ScanConfig::new("/r"), &mut log, &mut errors)
        .unwrap();

    assert!(errors.last().is_none());
    assert_eq!(ScanPhase::current(), ScanPhase::Scanning);
}

#[test]
fn test_consumer_verdict_is_returned() {
    let mut fs = MemFs::new("/r");
    fs.dir("e").fail_leave("e");
    let mut log = EventLog {
        stop_on_fatal: true,
        ..EventLog::default()
    };

    let outcome = Scanner::new()
        .scan(&mut fs, &ScanConfig::new("/r"), &mut log, &mut LastError::new())
        .unwrap();
    assert!(outcome.is_fatal());
    assert!(!outcome.continue_host);
}

#[test]
fn test_progress_snapshots() {
    let mut fs = MemFs::new("/r");
    fs.file("a", 512).file("b", 512).file("c", 512);
    let scanner = Scanner::new();
    let mut rx = scanner.subscribe();

    let config = ScanConfig::builder()
        .root("/r")
        .progress_interval(2u64)
        .build()
        .unwrap();
    let outcome = scanner
        .scan(&mut fs, &config, &mut EventLog::new(), &mut LastError::new())
        .unwrap();

    let first = rx.try_recv().unwrap();
    assert_eq!(first.entries_scanned, 2);
    let last = rx.try_recv().unwrap();
    assert_eq!(last.entries_scanned, 3);
    assert_eq!(last.bytes_scanned, 3 * 512);
    assert_eq!(outcome.entries, 3);
}

#[test]
fn test_tree_builder_over_scan() {
    let mut fs = MemFs::new("/r");
    fs.file("docs/a", 1000)
        .file("docs/b", 3000)
        .file("big", 10_000)
        .file("link1", 2048)
        .file("link2", 2048);
    fs.set_links("link1", 2).set_inode("link1", 500);
    fs.set_links("link2", 2).set_inode("link2", 500);

    let mut builder = TreeBuilder::new(SizeMode::Apparent);
    let outcome = Scanner::new()
        .scan(&mut fs, &ScanConfig::new("/r"), &mut builder, &mut LastError::new())
        .unwrap();
    assert!(outcome.continue_host);

    let tree = builder.into_tree().unwrap();
    assert!(tree.complete);
    assert_eq!(tree.root_path, PathBuf::from("/r"));
    assert_eq!(tree.total_files(), 5);
    assert_eq!(tree.total_dirs(), 1);
    assert_eq!(tree.stats.hardlink_duplicates, 1);
    // Two directories of 4096 each, plus files, with the hardlink once.
    assert_eq!(tree.total_size(), 4096 * 2 + 1000 + 3000 + 10_000 + 2048);
    assert_eq!(tree.root.children[0].name.as_str(), "big");
    assert_eq!(tree.root.child("docs").unwrap().apparent_size, 4096 + 4000);
}

#[test]
fn test_excluded_link_does_not_hide_counted_link() {
    let mut fs = MemFs::new("/r");
    fs.file("skip.log", 8192).file("keep", 8192);
    fs.set_links("skip.log", 2).set_inode("skip.log", 500);
    fs.set_links("keep", 2).set_inode("keep", 500);

    let config = ScanConfig::builder()
        .root("/r")
        .exclude_patterns(vec!["*.log".to_string()])
        .build()
        .unwrap();
    let mut builder = TreeBuilder::new(SizeMode::Apparent);
    Scanner::new()
        .scan(&mut fs, &config, &mut builder, &mut LastError::new())
        .unwrap();

    let tree = builder.into_tree().unwrap();
    assert_eq!(tree.stats.excluded, 1);
    assert_eq!(tree.stats.hardlink_duplicates, 0);
    assert_eq!(tree.total_size(), 4096 + 8192);
    assert_eq!(tree.root.child("keep").unwrap().apparent_size, 8192);
    assert_eq!(tree.root.child("skip.log").unwrap().apparent_size, 0);
}
