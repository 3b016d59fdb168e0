mod common;
use common::{closed, corrupt, d, dt, hourly, save_all, setup_store, starts};
use rtimetrace::filter::{self, CoarseBounds, Filter};
use rtimetrace::store::{CancelToken, ListScope, Lister, scanner};
use rtimetrace::{AppError, RecordStore, ScanState};
use std::fs;
use std::sync::Arc;

fn lister(store: &RecordStore, bounds: CoarseBounds, reversed: bool) -> Lister {
    Lister::new(
        store.records_dir().to_path_buf(),
        store.extension(),
        ListScope::All,
        bounds,
        reversed,
        CancelToken::new(),
    )
}

fn spread(store: &RecordStore) {
    save_all(
        store,
        &[
            closed("alpha", "1999-12-31 10:00", "1999-12-31 11:00"),
            closed("beta", "2001-02-03 04:05", "2001-02-03 05:05"),
            closed("alpha", "2001-02-03 06:05", "2001-02-03 07:05"),
            closed("beta", "2001-02-04 09:00", "2001-02-04 10:00"),
            closed("alpha", "2001-11-20 09:00", "2001-11-20 10:00"),
            closed("gamma", "2003-01-01 00:00", "2003-01-01 01:00"),
        ],
    );
}

#[test]
fn test_lister_walks_in_order_and_reverses_per_level() {
    let (_tmp, store) = setup_store(4);
    spread(&store);

    let forward: Vec<_> = lister(&store, CoarseBounds::default(), false)
        .collect::<Result<_, _>>()
        .unwrap();
    let mut expected = vec![
        dt("1999-12-31 10:00"),
        dt("2001-02-03 04:05"),
        dt("2001-02-03 06:05"),
        dt("2001-02-04 09:00"),
        dt("2001-11-20 09:00"),
        dt("2003-01-01 00:00"),
    ];
    assert_eq!(forward, expected);

    let backward: Vec<_> = lister(&store, CoarseBounds::default(), true)
        .collect::<Result<_, _>>()
        .unwrap();
    expected.reverse();
    assert_eq!(backward, expected);
}

#[test]
fn test_lister_prunes_by_coarse_bounds() {
    let (_tmp, store) = setup_store(4);
    spread(&store);

    let f = Filter::between(dt("2001-02-04 00:00"), dt("2001-02-05 00:00"));
    let candidates: Vec<_> = lister(&store, f.coarse_bounds(), false)
        .collect::<Result<_, _>>()
        .unwrap();

    // the day before is kept for records running past midnight
    assert_eq!(
        candidates,
        vec![
            dt("2001-02-03 04:05"),
            dt("2001-02-03 06:05"),
            dt("2001-02-04 09:00"),
        ]
    );
    assert!(f.year_in_range(2001));
    assert!(!f.year_in_range(2003));
    assert!(f.date_in_range(d("2001-02-03")));
    assert!(!f.date_in_range(d("2001-02-02")));
}

#[test]
fn test_lister_skips_foreign_entries() {
    let (_tmp, store) = setup_store(4);
    spread(&store);
    let root = store.records_dir();

    fs::create_dir_all(root.join("backup")).unwrap();
    fs::write(root.join("README"), "hello").unwrap();
    fs::create_dir_all(root.join("2001/13/01")).unwrap();
    fs::create_dir_all(root.join("2001/02/31")).unwrap();
    fs::write(root.join("2001/02/03/04-05.rec.bak"), "old").unwrap();
    fs::write(root.join("2001/02/03/notes.txt"), "misc").unwrap();

    let all: Vec<_> = lister(&store, CoarseBounds::default(), false)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(all.len(), 6);
}

#[test]
fn test_lister_fails_on_malformed_record_name() {
    let (_tmp, store) = setup_store(4);
    spread(&store);
    fs::write(store.records_dir().join("2001/02/03/zz-00.rec"), "x").unwrap();

    let items: Vec<_> = lister(&store, CoarseBounds::default(), false).collect();
    // 1999 record, then the failing day
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(matches!(items[1], Err(AppError::InvalidRecordPath(_))));
}

#[test]
fn test_lister_day_scope_and_missing_root() {
    let (_tmp, store) = setup_store(4);

    // no records directory at all
    assert_eq!(lister(&store, CoarseBounds::default(), false).count(), 0);

    spread(&store);
    let day: Vec<_> = Lister::new(
        store.records_dir().to_path_buf(),
        store.extension(),
        ListScope::Day(d("2001-02-03")),
        CoarseBounds::default(),
        true,
        CancelToken::new(),
    )
    .collect::<Result<_, _>>()
    .unwrap();
    assert_eq!(day, vec![dt("2001-02-03 06:05"), dt("2001-02-03 04:05")]);
}

#[test]
fn test_lister_stops_when_cancelled() {
    let (_tmp, store) = setup_store(4);
    spread(&store);

    let cancel = CancelToken::new();
    let mut it = Lister::new(
        store.records_dir().to_path_buf(),
        store.extension(),
        ListScope::All,
        CoarseBounds::default(),
        false,
        cancel.clone(),
    );
    assert!(it.next().is_some());
    cancel.cancel();
    assert!(it.next().is_none());
}

#[test]
fn test_scan_preserves_order_across_batches() {
    // 3 workers: batches do not line up with days
    let (_tmp, store) = setup_store(3);
    let mut expected = hourly(&store, "2001-02-03", 10);
    expected.extend(hourly(&store, "2001-02-04", 7));

    let all = store.load_all(&Filter::new()).unwrap();
    assert_eq!(all, expected);

    let mut reversed: Vec<_> = store
        .scan(&Filter::new(), true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    reversed.reverse();
    assert_eq!(reversed, expected);
}

#[test]
fn test_reversed_scan_mirrors_forward_scan_with_filter() {
    let (_tmp, store) = setup_store(2);
    spread(&store);
    let f = Filter::new().with_predicate(filter::project_in(["alpha"]));

    let forward = store.load_all(&f).unwrap();
    let mut backward: Vec<_> = store
        .scan(&f, true)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    backward.reverse();

    assert_eq!(forward.len(), 3);
    assert!(forward.iter().all(|r| r.project == "alpha"));
    assert_eq!(forward, backward);
}

#[test]
fn test_scan_output_is_exactly_the_overlap_set() {
    let (_tmp, store) = setup_store(4);
    spread(&store);
    // runs past midnight into the window
    let late = closed("night", "2001-02-04 23:00", "2001-02-05 01:00");
    store.save(&late, false).unwrap();

    let f = Filter::between(dt("2001-02-03 05:30"), dt("2001-02-05 00:30"));
    let got = store.load_all(&f).unwrap();

    assert_eq!(
        starts(&got),
        vec![
            dt("2001-02-03 06:05"),
            dt("2001-02-04 09:00"),
            dt("2001-02-04 23:00"),
        ]
    );

    let next_day = Filter::between(dt("2001-02-05 00:00"), dt("2001-02-06 00:00"));
    assert_eq!(starts(&store.load_all(&next_day).unwrap()), vec![late.start]);
}

#[test]
fn test_scan_with_tag_predicates() {
    let (_tmp, store) = setup_store(4);
    let mut a = closed("test", "2001-02-03 04:05", "2001-02-03 05:05");
    a.set_note("+bug +client=acme").unwrap();
    let mut b = closed("test", "2001-02-03 06:05", "2001-02-03 07:05");
    b.set_note("+client=other").unwrap();
    let c = closed("test", "2001-02-03 08:05", "2001-02-03 09:05");
    save_all(&store, &[a.clone(), b.clone(), c]);

    let any = Filter::new().with_predicate(filter::any_tag(["bug", "client"]));
    assert_eq!(store.load_all(&any).unwrap(), vec![a.clone(), b.clone()]);

    let all = Filter::new().with_predicate(filter::all_tags(["bug", "client"]));
    assert_eq!(store.load_all(&all).unwrap(), vec![a.clone()]);

    let eq = Filter::new().with_predicate(filter::tag_equals("client", "other"));
    assert_eq!(store.load_all(&eq).unwrap(), vec![b]);
}

#[test]
fn test_scan_fails_fast_on_malformed_record() {
    for workers in [1, 2, 32] {
        let (_tmp, store) = setup_store(workers);
        hourly(&store, "2001-02-03", 6);
        corrupt(&store, "2001-02-03 04:00");

        let mut stream = store.scan(&Filter::new(), false).unwrap();
        let items: Vec<_> = stream.by_ref().collect();

        assert_eq!(items.len(), 4, "workers = {workers}");
        assert!(items[..3].iter().all(|i| i.is_ok()));
        assert!(matches!(items[3], Err(AppError::Format { .. })));
        assert_eq!(stream.close(), ScanState::Failed);

        assert!(store.load_all(&Filter::new()).is_err());
    }
}

#[test]
fn test_scan_drained_state() {
    let (_tmp, store) = setup_store(4);
    hourly(&store, "2001-02-03", 5);

    let mut stream = store.scan(&Filter::new(), false).unwrap();
    assert_eq!(stream.by_ref().count(), 5);
    let state = stream.close();
    assert_eq!(state, ScanState::Drained);
    assert!(state.is_terminal());
    assert!(!ScanState::Collecting(4).is_terminal());
}

#[test]
fn test_scan_cancel_stops_without_error() {
    let (_tmp, store) = setup_store(4);
    hourly(&store, "2001-02-03", 20);
    hourly(&store, "2001-02-04", 20);

    let mut stream = store.scan(&Filter::new(), false).unwrap();
    let first = stream.next().unwrap().unwrap();
    assert_eq!(first.start, dt("2001-02-03 01:00"));

    stream.cancel();
    assert!(stream.next().is_none());
    assert!(stream.next().is_none());
    assert_eq!(stream.close(), ScanState::Cancelled);
}

#[test]
fn test_cancel_is_reported_when_candidates_stop_early() {
    let (_tmp, store) = setup_store(4);
    hourly(&store, "2001-02-03", 3);
    let store = Arc::new(store);

    // a cancelled lister closes its channel without an error
    let (tx, rx) = crossbeam_channel::bounded(4);
    let cancel = CancelToken::new();
    let stream = scanner::scan(
        Arc::clone(&store),
        rx,
        Filter::new(),
        4,
        cancel.clone(),
    )
    .unwrap();
    tx.send(Ok(dt("2001-02-03 01:00"))).unwrap();
    cancel.cancel();
    drop(tx);
    assert!(matches!(stream.into_vec(), Err(AppError::Cancelled)));

    // same partial feed without a cancel is a normal drain
    let (tx, rx) = crossbeam_channel::bounded(4);
    let stream =
        scanner::scan(Arc::clone(&store), rx, Filter::new(), 4, CancelToken::new()).unwrap();
    tx.send(Ok(dt("2001-02-03 01:00"))).unwrap();
    tx.send(Ok(dt("2001-02-03 02:00"))).unwrap();
    drop(tx);
    assert_eq!(starts(&stream.into_vec().unwrap()), vec![
        dt("2001-02-03 01:00"),
        dt("2001-02-03 02:00"),
    ]);
}

#[test]
fn test_cancel_token_wakes_blocked_waiters() {
    let token = CancelToken::new();
    assert_eq!(
        token.cancelled().try_recv(),
        Err(crossbeam_channel::TryRecvError::Empty)
    );

    let waiter = {
        let token = token.clone();
        std::thread::spawn(move || token.cancelled().recv().is_err())
    };
    token.cancel();

    assert!(waiter.join().unwrap());
    assert!(token.is_cancelled());
}

#[test]
fn test_close_reports_cancel_on_an_idle_feed() {
    let (_tmp, store) = setup_store(2);
    let (tx, rx) = crossbeam_channel::bounded(2);
    let stream =
        scanner::scan(Arc::new(store), rx, Filter::new(), 2, CancelToken::new()).unwrap();

    let token = stream.cancel_token();
    token.cancel();
    drop(tx);
    assert_eq!(stream.close(), ScanState::Cancelled);
}

#[test]
fn test_scan_cancel_from_another_handle() {
    let (_tmp, store) = setup_store(2);
    hourly(&store, "2001-02-03", 12);

    let mut stream = store.scan(&Filter::new(), true).unwrap();
    let token = stream.cancel_token();
    assert_eq!(stream.next().unwrap().unwrap().start, dt("2001-02-03 12:00"));

    token.cancel();
    assert!(stream.next().is_none());
}

#[test]
fn test_dropping_stream_early_is_clean() {
    let (_tmp, store) = setup_store(2);
    hourly(&store, "2001-02-03", 12);

    {
        let mut stream = store.scan(&Filter::new(), false).unwrap();
        assert!(stream.next().is_some());
    }

    // the store is still fully readable afterwards
    assert_eq!(store.load_all(&Filter::new()).unwrap().len(), 12);
}

#[test]
fn test_into_vec_reports_cancellation() {
    let (_tmp, store) = setup_store(4);
    hourly(&store, "2001-02-03", 20);
    hourly(&store, "2001-02-04", 20);

    let stream = store.scan(&Filter::new(), false).unwrap();
    stream.cancel_token().cancel();
    assert!(matches!(stream.into_vec(), Err(AppError::Cancelled)));

    let stream = store.scan(&Filter::new(), false).unwrap();
    assert_eq!(stream.into_vec().unwrap().len(), 40);
}
