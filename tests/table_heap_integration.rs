//! Integration tests for the table heap.
//!
//! Random workloads over the full stack: records in, records out,
//! inventory accuracy, durability across reopen, and concurrent churn.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use heapstore::table::{HeapHeader, PageEntry};
use heapstore::{BufferPool, FileManager, LruReplacer, Rid, TableHeap, TablePage, HEAP_HEADER_PAGE_ID};
use rand::Rng;
use tempfile::tempdir;

fn open_heap(path: &Path, pool_size: usize, is_new: bool) -> (Arc<BufferPool>, TableHeap) {
    let fm = FileManager::open(path).unwrap();
    let pool = Arc::new(BufferPool::new(
        pool_size,
        fm,
        Box::new(LruReplacer::new()),
    ));
    let heap = TableHeap::new(Arc::clone(&pool), is_new).unwrap();
    (pool, heap)
}

fn random_record(rng: &mut impl Rng) -> Vec<u8> {
    let len = rng.gen_range(1..=512);
    let mut record = vec![0u8; len];
    rng.fill(&mut record[..]);
    record
}

/// Every record must come back byte-identical, and every inventory
/// entry must match what its page reports.
fn verify_heap(pool: &Arc<BufferPool>, heap: &TableHeap, expected: &[(Rid, Vec<u8>)]) {
    let entries: Vec<PageEntry> = {
        let frame = pool.fetch_page(HEAP_HEADER_PAGE_ID).unwrap();
        let guard = frame.page();
        let header = HeapHeader::new(&*guard);
        let entries = (0..header.num_pages() as usize)
            .map(|i| header.entry_at(i))
            .collect();
        drop(guard);
        pool.unpin_page(HEAP_HEADER_PAGE_ID, false);
        entries
    };

    for entry in entries {
        let frame = pool.fetch_page(entry.page_id).unwrap();
        {
            let guard = frame.page();
            let page = TablePage::new(&*guard);
            assert_eq!(
                page.free_space_for_insert(),
                entry.free_for_insert,
                "inventory out of sync for {}",
                entry.page_id
            );
        }
        pool.unpin_page(entry.page_id, false);
    }

    for (rid, record) in expected {
        let found = heap.get(*rid).unwrap();
        assert_eq!(found.as_deref(), Some(record.as_slice()), "lost {}", rid);
    }
}

/// Run `total` operations, roughly `insert_ratio` of them inserts and
/// the rest deletes of previously inserted records.
fn mixed_workload(
    heap: &TableHeap,
    rng: &mut impl Rng,
    total: usize,
    insert_ratio: f64,
) -> Vec<(Rid, Vec<u8>)> {
    let mut live: Vec<(Rid, Vec<u8>)> = Vec::new();
    for _ in 0..total {
        let is_insert = rng.gen_bool(insert_ratio) || live.is_empty();
        if is_insert {
            let record = random_record(rng);
            let rid = heap.insert(&record).unwrap();
            live.push((rid, record));
        } else {
            let index = rng.gen_range(0..live.len());
            let (rid, _) = live.remove(index);
            assert!(heap.delete(rid).unwrap());
        }
    }
    live
}

#[test]
fn test_insert_many_then_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("heap.db");
    let mut rng = rand::thread_rng();

    let mut inserted = Vec::new();
    {
        let (pool, heap) = open_heap(&path, 8, true);
        for _ in 0..100 {
            let record = random_record(&mut rng);
            let rid = heap.insert(&record).unwrap();
            inserted.push((rid, record));
        }
        verify_heap(&pool, &heap, &inserted);
        pool.flush_all_pages().unwrap();
    }

    // A second stack over the same file sees every record.
    let (pool, heap) = open_heap(&path, 8, false);
    verify_heap(&pool, &heap, &inserted);
}

#[test]
fn test_mixed_workload_then_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("heap.db");
    let mut rng = rand::thread_rng();

    let live;
    {
        let (pool, heap) = open_heap(&path, 8, true);
        live = mixed_workload(&heap, &mut rng, 100, 0.70);
        verify_heap(&pool, &heap, &live);
        pool.flush_all_pages().unwrap();
    }

    let (pool, heap) = open_heap(&path, 8, false);
    verify_heap(&pool, &heap, &live);
}

#[test]
fn test_deleted_records_stay_deleted_after_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("heap.db");

    let keeper;
    let victim;
    {
        let (pool, heap) = open_heap(&path, 8, true);
        keeper = heap.insert(b"keeper").unwrap();
        victim = heap.insert(b"victim").unwrap();
        assert!(heap.delete(victim).unwrap());
        pool.flush_all_pages().unwrap();
    }

    let (_pool, heap) = open_heap(&path, 8, false);
    assert_eq!(heap.get(keeper).unwrap().unwrap(), b"keeper");
    assert_eq!(heap.get(victim).unwrap(), None);
}

#[test]
fn test_concurrent_mixed_workload() {
    const WORKERS: usize = 10;
    const OPS_PER_WORKER: usize = 100;

    let dir = tempdir().unwrap();
    let path = dir.path().join("heap.db");
    // Each worker can hold two pins at once (data page + header), so
    // the pool must have headroom for all of them.
    let (pool, heap) = open_heap(&path, 32, true);
    let heap = Arc::new(heap);

    let mut handles = vec![];
    for _ in 0..WORKERS {
        let heap = Arc::clone(&heap);
        handles.push(thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut live: Vec<(Rid, Vec<u8>)> = Vec::new();
            for _ in 0..OPS_PER_WORKER {
                let is_insert = rng.gen_bool(0.70) || live.is_empty();
                if is_insert {
                    let record = random_record(&mut rng);
                    let rid = heap.insert(&record).unwrap();
                    live.push((rid, record));
                } else {
                    let index = rng.gen_range(0..live.len());
                    let (rid, _) = live.remove(index);
                    assert!(heap.delete(rid).unwrap());
                }
            }
            live
        }));
    }

    let mut survivors: Vec<(Rid, Vec<u8>)> = Vec::new();
    for handle in handles {
        survivors.extend(handle.join().unwrap());
    }

    // Workers only delete their own records, so every surviving rid
    // must still resolve to its original bytes.
    verify_heap(&pool, &heap, &survivors);
}

#[test]
fn test_concurrent_readers_of_one_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("heap.db");
    let (_pool, heap) = open_heap(&path, 8, true);
    let heap = Arc::new(heap);

    let rid = heap.insert(b"shared bytes").unwrap();

    let mut handles = vec![];
    for _ in 0..8 {
        let heap = Arc::clone(&heap);
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                assert_eq!(heap.get(rid).unwrap().unwrap(), b"shared bytes");
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}
