/**********************************************
  > File Name		: indexing/tests.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Sat 08 May 2021 10:03:42 AM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use proptest::prelude::*;

use super::node::{IndexPage, LeafPage, Node};
use super::*;
use crate::errors::IndexingError;
use crate::page_management::{PageFileHandle, PageFileManager, PageFileOptions, PageId};
use crate::record_management::RID;

fn init(page_size: usize) -> (tempfile::TempDir, PathBuf, PageFileManager, PageFileHandle) {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().expect("create temp dir failed");
    let path = dir.path().join("index");
    let pfm = PageFileManager::with_options(
        PageFileOptions::default()
            .with_page_size(page_size)
            .with_buffer_frames(8),
    );
    let pfh = pfm.create_file(&path).expect("create page file failed");
    (dir, path, pfm, pfh)
}

fn int_index(pfh: &PageFileHandle, name: &str) -> IndexHandle {
    IndexFileManager::create_file(pfh, name, AttrType::INT, 10, DeletePolicy::Naive).unwrap()
}

fn rid(k: i32) -> RID {
    RID::new(0, k as u32)
}

fn as_int(key: &Key) -> i32 {
    match key {
        Key::Int(v) => *v,
        Key::Str(s) => panic!("unexpected string key {}", s),
    }
}

fn scan_all(index: &mut IndexHandle, lo: Option<i32>, hi: Option<i32>) -> Vec<(Key, RID)> {
    let lo = lo.map(Key::Int);
    let hi = hi.map(Key::Int);
    index
        .scan(lo.as_ref(), hi.as_ref())
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
}

fn scan_keys(index: &mut IndexHandle, lo: Option<i32>, hi: Option<i32>) -> Vec<i32> {
    scan_all(index, lo, hi).iter().map(|(k, _)| as_int(k)).collect()
}

/*
 * Walk the whole tree: every leaf at the same depth, separators
 * strictly increasing, every key inside the range its parents give it.
 * Only meaningful for trees without duplicate keys.
 */
fn check_subtree(
    pfh: &PageFileHandle,
    page: PageId,
    lo: Option<i32>,
    hi: Option<i32>,
    depth: usize,
    leaf_depths: &mut Vec<usize>,
) {
    match Node::pin(pfh, page, AttrType::INT).unwrap() {
        Node::Index(index) => {
            let children = index.children().unwrap();
            let seps: Vec<i32> = (0..index.num_entries())
                .map(|i| as_int(&index.get_entry(i).unwrap().0))
                .collect();
            index.release().unwrap();
            assert!(!seps.is_empty(), "index node {} has no entries", page);
            assert!(seps.windows(2).all(|w| w[0] < w[1]), "separators {:?}", seps);

            let mut bounds = vec![lo];
            bounds.extend(seps.iter().map(|s| Some(*s)));
            bounds.push(hi);
            for (i, child) in children.iter().enumerate() {
                check_subtree(pfh, *child, bounds[i], bounds[i + 1], depth + 1, leaf_depths);
            }
        }
        Node::Leaf(leaf) => {
            for (k, _) in leaf.entries().unwrap() {
                let k = as_int(&k);
                if let Some(lo) = lo {
                    assert!(k >= lo, "key {} below {} in leaf {}", k, lo, page);
                }
                if let Some(hi) = hi {
                    assert!(k < hi, "key {} not below {} in leaf {}", k, hi, page);
                }
            }
            leaf.release().unwrap();
            leaf_depths.push(depth);
        }
    }
}

fn check_tree(pfh: &PageFileHandle, index: &IndexHandle) {
    let root = match index.root_page() {
        Some(root) => root,
        None => return,
    };
    let mut leaf_depths = Vec::new();
    check_subtree(pfh, root, None, None, 1, &mut leaf_depths);
    assert!(leaf_depths.iter().all(|d| *d == leaf_depths[0]));
    assert_eq!(leaf_depths[0], index.depth().unwrap());
    assert_eq!(pfh.pinned_count(), 0);
}

/*
 * Follow left links down to the first leaf, then the next links to the
 * end, checking every prev link on the way. Returns the chained keys.
 */
fn walk_leaf_chain(pfh: &PageFileHandle, index: &IndexHandle) -> Vec<i32> {
    let mut page = match index.root_page() {
        Some(root) => root,
        None => return Vec::new(),
    };
    let first = loop {
        match Node::pin(pfh, page, AttrType::INT).unwrap() {
            Node::Index(i) => {
                page = i.get_left_link();
                i.release().unwrap();
            }
            Node::Leaf(l) => break l,
        }
    };
    assert_eq!(first.prev_page(), None);

    let mut keys = Vec::new();
    let mut leaf = first;
    loop {
        keys.extend(leaf.entries().unwrap().iter().map(|(k, _)| as_int(k)));
        let (cur, next) = (leaf.page_id(), leaf.next_page());
        leaf.release().unwrap();
        match next {
            Some(next) => {
                leaf = LeafPage::pin(pfh, next, AttrType::INT).unwrap();
                assert_eq!(leaf.prev_page(), Some(cur));
            }
            None => break,
        }
    }
    keys
}

//distinct keys 0..n in a scattered order.
fn scattered(n: i32) -> Vec<i32> {
    (0..n).map(|i| (i * 37) % n).collect()
}

/*
 * Page size 80 leaves 60 bytes for slots and entries, an integer leaf
 * entry takes 12 + 4, so the fourth insert splits the only leaf.
 */
#[test]
fn four_inserts_split_the_first_leaf() {
    let (_dir, _, _, pfh) = init(80);
    let mut index = int_index(&pfh, "tree");

    for k in [5, 1, 9] {
        index.insert_entry(&Key::Int(k), &rid(k)).unwrap();
    }
    let first_leaf = index.root_page().unwrap();
    assert_eq!(index.depth().unwrap(), 1);

    index.insert_entry(&Key::Int(3), &rid(3)).unwrap();
    assert_eq!(index.depth().unwrap(), 2);
    let root = index.root_page().unwrap();
    assert_ne!(root, first_leaf);

    let root_page = IndexPage::pin(&pfh, root, AttrType::INT).unwrap();
    assert_eq!(root_page.get_left_link(), first_leaf);
    assert_eq!(root_page.num_entries(), 1);
    let (separator, new_leaf) = root_page.get_entry(0).unwrap();
    root_page.release().unwrap();
    assert_eq!(separator, Key::Int(9));

    let left = LeafPage::pin(&pfh, first_leaf, AttrType::INT).unwrap();
    let right = LeafPage::pin(&pfh, new_leaf, AttrType::INT).unwrap();
    assert_eq!(
        left.entries().unwrap(),
        vec![(Key::Int(1), rid(1)), (Key::Int(3), rid(3)), (Key::Int(5), rid(5))]
    );
    assert_eq!(right.entries().unwrap(), vec![(Key::Int(9), rid(9))]);
    assert_eq!(left.next_page(), Some(new_leaf));
    assert_eq!(right.prev_page(), Some(first_leaf));
    assert_eq!(right.next_page(), None);
    left.release().unwrap();
    right.release().unwrap();

    assert_eq!(scan_keys(&mut index, None, None), vec![1, 3, 5, 9]);
    assert!(index.delete_entry(&Key::Int(9), &rid(9)).unwrap());
    assert_eq!(scan_keys(&mut index, None, None), vec![1, 3, 5]);
    assert_eq!(pfh.pinned_count(), 0);
}

/*
 * A 256 byte leaf holds 14 integer entries, the 15th splits it. Both
 * halves should end up within one entry of each other.
 */
#[test]
fn leaf_split_balances_free_space() {
    let (_dir, _, _, pfh) = init(256);
    let mut index = int_index(&pfh, "tree");
    let keys = scattered(15);
    for k in &keys[..14] {
        index.insert_entry(&Key::Int(*k * 10), &rid(*k)).unwrap();
    }
    assert_eq!(index.depth().unwrap(), 1);
    index.insert_entry(&Key::Int(keys[14] * 10), &rid(keys[14])).unwrap();
    assert_eq!(index.depth().unwrap(), 2);

    let root = IndexPage::pin(&pfh, index.root_page().unwrap(), AttrType::INT).unwrap();
    let (left, right) = (root.get_left_link(), root.get_entry(0).unwrap().1);
    root.release().unwrap();
    let left = LeafPage::pin(&pfh, left, AttrType::INT).unwrap();
    let right = LeafPage::pin(&pfh, right, AttrType::INT).unwrap();
    let entry = 12 + 4;
    assert!(left.available_space().abs_diff(right.available_space()) <= entry);
    assert_eq!(left.num_entries() + right.num_entries(), 15);
    left.release().unwrap();
    right.release().unwrap();

    assert_eq!(walk_leaf_chain(&pfh, &index), (0..15).map(|k| k * 10).collect::<Vec<_>>());
    check_tree(&pfh, &index);
}

#[test]
fn inserted_entries_come_back_in_order() {
    let (_dir, _, _, pfh) = init(128);
    let mut index = int_index(&pfh, "tree");
    let keys = scattered(500);
    for k in &keys {
        index.insert_entry(&Key::Int(*k), &rid(*k)).unwrap();
    }

    let entries = scan_all(&mut index, None, None);
    let expected: Vec<(Key, RID)> = (0..500).map(|k| (Key::Int(k), rid(k))).collect();
    assert_eq!(entries, expected);
    assert_eq!(walk_leaf_chain(&pfh, &index), (0..500).collect::<Vec<_>>());
    check_tree(&pfh, &index);
}

#[test]
fn root_grows_one_level_at_a_time() {
    let (_dir, _, _, pfh) = init(80);
    let mut index = int_index(&pfh, "tree");
    let mut depth = 0;
    let mut root = None;
    for k in 0..200 {
        index.insert_entry(&Key::Int(k), &rid(k)).unwrap();
        let new_depth = index.depth().unwrap();
        assert!(new_depth == depth || new_depth == depth + 1);
        if new_depth != depth {
            assert_ne!(index.root_page(), root);
        } else {
            assert_eq!(index.root_page(), root);
        }
        depth = new_depth;
        root = index.root_page();
        check_tree(&pfh, &index);
    }
    assert!(depth >= 3, "depth {} after 200 inserts", depth);
    assert_eq!(scan_keys(&mut index, None, None), (0..200).collect::<Vec<_>>());
}

#[test]
fn range_scans() {
    let (_dir, _, _, pfh) = init(128);
    let mut index = int_index(&pfh, "tree");
    for k in scattered(50) {
        index.insert_entry(&Key::Int(k * 2), &rid(k)).unwrap();
    }

    assert_eq!(scan_keys(&mut index, Some(10), Some(20)), vec![10, 12, 14, 16, 18, 20]);
    assert_eq!(scan_keys(&mut index, Some(11), Some(19)), vec![12, 14, 16, 18]);
    assert_eq!(scan_keys(&mut index, None, Some(5)), vec![0, 2, 4]);
    assert_eq!(scan_keys(&mut index, Some(93), None), vec![94, 96, 98]);
    assert_eq!(scan_keys(&mut index, Some(42), Some(42)), vec![42]);
    assert_eq!(scan_keys(&mut index, Some(43), Some(43)), Vec::<i32>::new());
    assert_eq!(scan_keys(&mut index, Some(30), Some(20)), Vec::<i32>::new());
    assert_eq!(scan_keys(&mut index, Some(100), None), Vec::<i32>::new());
    assert_eq!(scan_keys(&mut index, None, Some(-1)), Vec::<i32>::new());
    assert_eq!(scan_keys(&mut index, None, None).len(), 50);
    assert_eq!(pfh.pinned_count(), 0);
}

#[test]
fn duplicates_span_leaves() {
    let (_dir, _, _, pfh) = init(128);
    let mut index = int_index(&pfh, "tree");
    let mut sevens = Vec::new();
    for i in 0..40 {
        index.insert_entry(&Key::Int(i), &RID::new(1, i as u32)).unwrap();
        let r = RID::new(7, i as u32);
        index.insert_entry(&Key::Int(7), &r).unwrap();
        sevens.push(r);
    }
    assert!(index.depth().unwrap() >= 2);

    let mut found: Vec<RID> = scan_all(&mut index, Some(7), Some(7))
        .into_iter()
        .map(|(k, r)| {
            assert_eq!(k, Key::Int(7));
            r
        })
        .collect();
    found.sort();
    let mut expected = sevens.clone();
    expected.push(RID::new(1, 7));
    expected.sort();
    assert_eq!(found, expected);

    let all = scan_keys(&mut index, None, None);
    assert_eq!(all.len(), 80);
    assert!(all.windows(2).all(|w| w[0] <= w[1]));

    for r in sevens.iter().rev() {
        assert!(index.delete_entry(&Key::Int(7), r).unwrap());
    }
    let left: Vec<RID> = scan_all(&mut index, Some(7), Some(7)).into_iter().map(|(_, r)| r).collect();
    assert_eq!(left, vec![RID::new(1, 7)]);
    assert_eq!(scan_keys(&mut index, None, None), (0..40).collect::<Vec<_>>());
    assert_eq!(pfh.pinned_count(), 0);
}

/*
 * A long run of one key fills whole index nodes with equal separators.
 * Index splits must keep those children in leaf chain order, or later
 * larger keys get routed ahead of the run.
 */
#[test]
fn equal_separators_survive_index_splits() {
    let (_dir, _, _, pfh) = init(80);
    let mut index = int_index(&pfh, "tree");
    for i in 0..200 {
        index.insert_entry(&Key::Int(7), &RID::new(7, i)).unwrap();
    }
    assert!(index.depth().unwrap() >= 3);

    let mut expected = vec![7; 200];
    for i in 0..100 {
        let k = 8 + i % 5;
        index.insert_entry(&Key::Int(k), &rid(k)).unwrap();
        expected.push(k);
        expected.sort();
        assert_eq!(scan_keys(&mut index, None, None), expected, "after {} larger keys", i + 1);
    }
    assert_eq!(walk_leaf_chain(&pfh, &index), expected);
    assert_eq!(scan_keys(&mut index, Some(7), Some(7)).len(), 200);
    for k in 8..13 {
        assert_eq!(scan_keys(&mut index, Some(k), Some(k)).len(), 20);
    }
    assert_eq!(pfh.pinned_count(), 0);
}

#[test]
fn naive_delete_removes_only_the_pair() {
    let (_dir, _, _, pfh) = init(128);
    let mut index = int_index(&pfh, "tree");
    for k in scattered(100) {
        index.insert_entry(&Key::Int(k), &rid(k)).unwrap();
    }
    let allocated = pfh.allocated_count();

    assert!(index.delete_entry(&Key::Int(42), &rid(42)).unwrap());
    assert!(!index.delete_entry(&Key::Int(42), &rid(42)).unwrap());
    let keys = scan_keys(&mut index, None, None);
    assert_eq!(keys.len(), 99);
    assert!(!keys.contains(&42));

    //emptying leaves doesn't free or merge anything.
    for k in 0..60 {
        if k != 42 {
            assert!(index.delete_entry(&Key::Int(k), &rid(k)).unwrap());
        }
    }
    assert_eq!(pfh.allocated_count(), allocated);
    assert_eq!(scan_keys(&mut index, None, None), (60..100).collect::<Vec<_>>());
    assert_eq!(scan_keys(&mut index, Some(10), Some(70)), (60..=70).collect::<Vec<_>>());

    //empty leaves take new entries again.
    index.insert_entry(&Key::Int(5), &rid(5)).unwrap();
    assert_eq!(scan_keys(&mut index, None, Some(61)), vec![5, 60, 61]);
    assert_eq!(pfh.pinned_count(), 0);
}

#[test]
fn deleting_a_missing_pair_changes_nothing() {
    let (_dir, path, _, pfh) = init(128);
    let mut index = int_index(&pfh, "tree");
    for k in scattered(60) {
        index.insert_entry(&Key::Int(k), &rid(k)).unwrap();
    }
    pfh.flush_pages().unwrap();
    let before = std::fs::read(&path).unwrap();

    assert!(!index.delete_entry(&Key::Int(10), &rid(11)).unwrap());
    assert!(!index.delete_entry(&Key::Int(1000), &rid(1000)).unwrap());
    assert!(!index.delete_entry(&Key::Int(-5), &rid(-5)).unwrap());
    pfh.flush_pages().unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert_eq!(pfh.pinned_count(), 0);
}

#[test]
fn empty_tree() {
    let (_dir, _, _, pfh) = init(128);
    let mut index = int_index(&pfh, "tree");
    assert_eq!(index.root_page(), None);
    assert_eq!(index.depth().unwrap(), 0);
    assert!(index.scan(None, None).unwrap().get_next().unwrap().is_none());
    assert!(scan_all(&mut index, Some(1), Some(3)).is_empty());
    assert!(!index.delete_entry(&Key::Int(1), &rid(1)).unwrap());
    index.dump_tree().unwrap();
    assert_eq!(pfh.pinned_count(), 0);
}

#[test]
fn destroy_frees_every_page() {
    let (_dir, _, _, pfh) = init(80);
    let mut index = int_index(&pfh, "tree");
    for k in scattered(150) {
        index.insert_entry(&Key::Int(k), &rid(k)).unwrap();
    }
    assert!(index.depth().unwrap() >= 3);
    assert!(pfh.allocated_count() > 10);

    index.destroy().unwrap();
    assert_eq!(pfh.allocated_count(), 0);
    assert_eq!(pfh.pinned_count(), 0);
    assert_eq!(pfh.get_file_entry("tree"), None);
    assert!(matches!(
        IndexFileManager::open_file(&pfh, "tree"),
        Err(IndexingError::NotFound(_))
    ));
}

#[test]
fn full_delete_policy_is_rejected() {
    let (_dir, _, _, pfh) = init(128);
    let mut index = IndexFileManager::create_file(&pfh, "tree", AttrType::INT, 4, DeletePolicy::Full).unwrap();
    index.insert_entry(&Key::Int(1), &rid(1)).unwrap();
    assert!(matches!(
        index.delete_entry(&Key::Int(1), &rid(1)),
        Err(IndexingError::UnsupportedDeletePolicy(1))
    ));
    assert!(matches!(
        index.delete_entry(&Key::from("one"), &rid(1)),
        Err(IndexingError::UnsupportedDeletePolicy(1))
    ));
    assert_eq!(scan_keys(&mut index, None, None), vec![1]);
}

#[test]
fn bad_keys_are_rejected_before_any_change() {
    let (_dir, _, _, pfh) = init(128);
    let mut ints = int_index(&pfh, "ints");
    assert!(matches!(
        ints.insert_entry(&Key::from("one"), &rid(1)),
        Err(IndexingError::KeyTypeMismatch {
            expected: AttrType::INT,
            found: AttrType::STRING
        })
    ));
    assert!(matches!(
        ints.delete_entry(&Key::from("one"), &rid(1)),
        Err(IndexingError::KeyTypeMismatch { .. })
    ));
    assert!(matches!(
        ints.scan(Some(&Key::from("a")), None),
        Err(IndexingError::KeyTypeMismatch { .. })
    ));
    assert_eq!(ints.root_page(), None);

    let mut strs = IndexFileManager::create_file(&pfh, "strs", AttrType::STRING, 6, DeletePolicy::Naive).unwrap();
    strs.insert_entry(&Key::from("abcd"), &rid(1)).unwrap();
    let root = strs.root_page();
    assert!(matches!(
        strs.insert_entry(&Key::from("abcde"), &rid(2)),
        Err(IndexingError::KeySizeExceeded { size: 7, max: 6 })
    ));
    assert_eq!(strs.root_page(), root);
    assert_eq!(strs.scan(None, None).unwrap().count(), 1);
    //too long to have been inserted, so simply not there.
    assert!(!strs.delete_entry(&Key::from("abcdefgh"), &rid(1)).unwrap());
    assert_eq!(strs.scan(None, None).unwrap().count(), 1);

    assert!(matches!(
        IndexFileManager::create_file(&pfh, "bad", AttrType::INT, 2, DeletePolicy::Naive),
        Err(IndexingError::InvalidAttr { .. })
    ));
    assert_eq!(pfh.get_file_entry("bad"), None);
}

#[test]
fn string_keys() {
    let (_dir, _, _, pfh) = init(256);
    let mut index = IndexFileManager::create_file(&pfh, "words", AttrType::STRING, 22, DeletePolicy::Naive).unwrap();
    let words = [
        "orion", "vega", "arcturus", "sirius", "rigel", "deneb", "altair", "spica", "antares", "pollux",
        "castor", "capella", "aldebaran", "procyon", "betelgeuse", "canopus", "achernar", "hadar",
    ];
    for (i, w) in words.iter().enumerate() {
        index.insert_entry(&Key::from(*w), &RID::new(3, i as u32)).unwrap();
    }
    let mut sorted: Vec<&str> = words.to_vec();
    sorted.sort();
    let found: Vec<String> = index
        .scan(None, None)
        .unwrap()
        .map(|e| e.unwrap().0.to_string())
        .collect();
    assert_eq!(found, sorted);

    let from_c: Vec<String> = index
        .scan(Some(&Key::from("c")), Some(&Key::from("r")))
        .unwrap()
        .map(|e| e.unwrap().0.to_string())
        .collect();
    assert_eq!(from_c, vec!["canopus", "capella", "castor", "deneb", "hadar", "orion", "pollux", "procyon"]);
    assert!(index.delete_entry(&Key::from("vega"), &RID::new(3, 1)).unwrap());
    assert_eq!(index.scan(None, None).unwrap().count(), words.len() - 1);
}

#[test]
fn scan_deletes_current_entry() {
    let (_dir, _, _, pfh) = init(128);
    let mut index = int_index(&pfh, "tree");
    for k in scattered(40) {
        index.insert_entry(&Key::Int(k), &rid(k)).unwrap();
    }

    let mut scan = index.scan(None, None).unwrap();
    assert_eq!(scan.key_size(), 10);
    assert!(!scan.delete_current().unwrap());
    let mut seen = Vec::new();
    while let Some((key, _)) = scan.get_next().unwrap() {
        let k = as_int(&key);
        seen.push(k);
        if k % 2 == 0 {
            assert!(scan.delete_current().unwrap());
            assert!(!scan.delete_current().unwrap());
        }
    }
    scan.close().unwrap();
    assert_eq!(seen, (0..40).collect::<Vec<_>>());
    assert_eq!(scan_keys(&mut index, None, None), (0..40).filter(|k| k % 2 == 1).collect::<Vec<_>>());
    assert_eq!(pfh.pinned_count(), 0);
}

#[test]
fn abandoned_scan_releases_its_leaf() {
    let (_dir, _, _, pfh) = init(128);
    let mut index = int_index(&pfh, "tree");
    for k in 0..30 {
        index.insert_entry(&Key::Int(k), &rid(k)).unwrap();
    }
    let mut scan = index.scan(Some(&Key::Int(3)), None).unwrap();
    assert_eq!(scan.next().unwrap().unwrap().0, Key::Int(3));
    assert_eq!(pfh.pinned_count(), 1);
    drop(scan);
    assert_eq!(pfh.pinned_count(), 0);
}

#[derive(Clone, Default)]
struct SharedTrace(Rc<RefCell<Vec<TraceEvent>>>);

impl TraceSink for SharedTrace {
    fn event(&mut self, event: &TraceEvent) {
        self.0.borrow_mut().push(event.clone());
    }
}

#[test]
fn trace_records_inserts_splits_and_visits() {
    let (_dir, _, _, pfh) = init(80);
    let mut index = int_index(&pfh, "tree");
    let trace = SharedTrace::default();
    index.attach_trace(Box::new(trace.clone()));

    for k in [5, 1, 9] {
        index.insert_entry(&Key::Int(k), &rid(k)).unwrap();
    }
    let first_leaf = index.root_page().unwrap();
    index.insert_entry(&Key::Int(3), &rid(3)).unwrap();
    let root = index.root_page().unwrap();
    let new_leaf = {
        let page = IndexPage::pin(&pfh, root, AttrType::INT).unwrap();
        let (_, child) = page.get_entry(0).unwrap();
        page.release().unwrap();
        child
    };

    let insert = |k| TraceEvent::Insert {
        key: Key::Int(k),
        rid: rid(k),
    };
    assert_eq!(
        *trace.0.borrow(),
        vec![
            insert(5),
            insert(1),
            insert(9),
            insert(3),
            TraceEvent::LeafChildren {
                page: first_leaf,
                entries: vec![(Key::Int(1), rid(1)), (Key::Int(3), rid(3)), (Key::Int(5), rid(5))],
            },
            TraceEvent::LeafChildren {
                page: new_leaf,
                entries: vec![(Key::Int(9), rid(9))],
            },
            TraceEvent::IndexChildren {
                page: root,
                left_link: first_leaf,
                children: vec![new_leaf],
            },
        ]
    );

    //ties go left: the run of 9 is searched from the first leaf on.
    trace.0.borrow_mut().clear();
    assert_eq!(scan_keys(&mut index, Some(9), None), vec![9]);
    assert_eq!(
        *trace.0.borrow(),
        vec![TraceEvent::Visit { page: root }, TraceEvent::Visit { page: first_leaf }]
    );

    assert!(index.detach_trace().is_some());
    index.insert_entry(&Key::Int(7), &rid(7)).unwrap();
    assert_eq!(trace.0.borrow().len(), 2);
}

#[test]
fn index_survives_reopen() {
    let (_dir, path, pfm, pfh) = init(128);
    let header = {
        let mut index = int_index(&pfh, "tree");
        for k in scattered(120) {
            index.insert_entry(&Key::Int(k), &rid(k)).unwrap();
        }
        let header = *index.header();
        index.close().unwrap();
        pfh.close().unwrap();
        header
    };
    drop(pfh);

    let pfh = pfm.open_file(&path).unwrap();
    let mut index = IndexFileManager::open_file(&pfh, "tree").unwrap();
    assert_eq!(*index.header(), header);
    assert_eq!(scan_keys(&mut index, None, None), (0..120).collect::<Vec<_>>());
    check_tree(&pfh, &index);

    //creating an existing name opens it, the new attributes are ignored.
    let again = IndexFileManager::create_file(&pfh, "tree", AttrType::STRING, 20, DeletePolicy::Full).unwrap();
    assert_eq!(*again.header(), header);
    assert!(matches!(
        IndexFileManager::open_file(&pfh, "other"),
        Err(IndexingError::NotFound(_))
    ));
}

#[test]
fn two_indexes_share_a_file() {
    let (_dir, _, _, pfh) = init(128);
    let mut evens = int_index(&pfh, "evens");
    let mut odds = int_index(&pfh, "odds");
    for k in 0..60 {
        if k % 2 == 0 {
            evens.insert_entry(&Key::Int(k), &rid(k)).unwrap();
        } else {
            odds.insert_entry(&Key::Int(k), &rid(k)).unwrap();
        }
    }
    assert_eq!(scan_keys(&mut evens, None, None), (0..60).step_by(2).collect::<Vec<_>>());
    evens.destroy().unwrap();
    assert_eq!(scan_keys(&mut odds, None, None), (1..60).step_by(2).collect::<Vec<_>>());
    check_tree(&pfh, &odds);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn scan_returns_sorted_inserts(keys in prop::collection::vec(-500i32..500, 0..300)) {
        let (_dir, _, _, pfh) = init(128);
        let mut index = int_index(&pfh, "tree");
        for (i, k) in keys.iter().enumerate() {
            index.insert_entry(&Key::Int(*k), &RID::new(*k as u32, i as u32)).unwrap();
        }

        let found = scan_all(&mut index, None, None);
        let found_keys: Vec<i32> = found.iter().map(|(k, _)| as_int(k)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        prop_assert_eq!(found_keys, sorted);

        let mut found_rids: Vec<RID> = found.iter().map(|(_, r)| *r).collect();
        let mut rids: Vec<RID> = keys.iter().enumerate().map(|(i, k)| RID::new(*k as u32, i as u32)).collect();
        found_rids.sort();
        rids.sort();
        prop_assert_eq!(found_rids, rids);
        prop_assert_eq!(pfh.pinned_count(), 0);
    }

    #[test]
    fn heavy_duplicates_stay_ordered(keys in prop::collection::vec(0i32..4, 100..400)) {
        let (_dir, _, _, pfh) = init(80);
        let mut index = int_index(&pfh, "tree");
        for (i, k) in keys.iter().enumerate() {
            index.insert_entry(&Key::Int(*k), &RID::new(*k as u32, i as u32)).unwrap();
        }

        let mut sorted = keys.clone();
        sorted.sort();
        prop_assert_eq!(scan_keys(&mut index, None, None), sorted.clone());
        prop_assert_eq!(walk_leaf_chain(&pfh, &index), sorted);
        for k in 0..4 {
            let count = keys.iter().filter(|x| **x == k).count();
            prop_assert_eq!(scan_keys(&mut index, Some(k), Some(k)).len(), count);
        }
        prop_assert_eq!(pfh.pinned_count(), 0);
    }
}
