use mpt::{types::EMPTY_ROOT, Op, Trie};

#[tokio::test]
async fn empty_trie_has_the_canonical_empty_root() {
    let trie = Trie::new_in_memory();
    assert_eq!(trie.root().await, *EMPTY_ROOT);
    assert_eq!(trie.get(b"anything").await.unwrap(), None);
}

#[tokio::test]
async fn single_key_round_trips() {
    let trie = Trie::new_in_memory();
    trie.put(b"key", b"value".to_vec()).await.unwrap();
    assert_eq!(trie.get(b"key").await.unwrap(), Some(b"value".to_vec()));
    assert_ne!(trie.root().await, *EMPTY_ROOT);
}

#[tokio::test]
async fn shared_prefix_keys_coexist() {
    let trie = Trie::new_in_memory();
    trie.put(b"dog", b"1".to_vec()).await.unwrap();
    trie.put(b"doge", b"2".to_vec()).await.unwrap();
    trie.put(b"dogecoin", b"3".to_vec()).await.unwrap();

    assert_eq!(trie.get(b"dog").await.unwrap(), Some(b"1".to_vec()));
    assert_eq!(trie.get(b"doge").await.unwrap(), Some(b"2".to_vec()));
    assert_eq!(trie.get(b"dogecoin").await.unwrap(), Some(b"3".to_vec()));
    assert_eq!(trie.get(b"cat").await.unwrap(), None);
}

#[tokio::test]
async fn deleting_all_keys_returns_to_the_empty_root() {
    let trie = Trie::new_in_memory();
    trie.put(b"dog", b"1".to_vec()).await.unwrap();
    trie.put(b"doge", b"2".to_vec()).await.unwrap();
    trie.put(b"dogecoin", b"3".to_vec()).await.unwrap();

    trie.del(b"dogecoin").await.unwrap();
    trie.del(b"doge").await.unwrap();
    trie.del(b"dog").await.unwrap();

    assert_eq!(trie.root().await, *EMPTY_ROOT);
}

#[tokio::test]
async fn root_hash_is_a_pure_function_of_contents() {
    let a = Trie::new_in_memory();
    a.put(b"x", b"1".to_vec()).await.unwrap();
    a.put(b"y", b"2".to_vec()).await.unwrap();
    a.put(b"z", b"3".to_vec()).await.unwrap();

    let b = Trie::new_in_memory();
    b.put(b"z", b"3".to_vec()).await.unwrap();
    b.put(b"x", b"1".to_vec()).await.unwrap();
    b.put(b"y", b"2".to_vec()).await.unwrap();

    assert_eq!(a.root().await, b.root().await);
}

#[tokio::test]
async fn six_insertion_orderings_converge_on_the_same_root() {
    let pairs: Vec<(&[u8], &[u8])> = vec![(b"a", b"1"), (b"ab", b"2"), (b"abc", b"3")];

    let mut orderings = vec![pairs.clone()];
    orderings.push(vec![pairs[0], pairs[2], pairs[1]]);
    orderings.push(vec![pairs[1], pairs[0], pairs[2]]);
    orderings.push(vec![pairs[1], pairs[2], pairs[0]]);
    orderings.push(vec![pairs[2], pairs[0], pairs[1]]);
    orderings.push(vec![pairs[2], pairs[1], pairs[0]]);

    let mut roots = Vec::new();
    for ordering in orderings {
        let trie = Trie::new_in_memory();
        for (k, v) in ordering {
            trie.put(k, v.to_vec()).await.unwrap();
        }
        roots.push(trie.root().await);
    }

    assert!(roots.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn empty_value_put_is_treated_as_a_delete() {
    let trie = Trie::new_in_memory();
    trie.put(b"key", b"value".to_vec()).await.unwrap();
    trie.put(b"key", Vec::new()).await.unwrap();
    assert_eq!(trie.get(b"key").await.unwrap(), None);
    assert_eq!(trie.root().await, *EMPTY_ROOT);
}

#[tokio::test]
async fn zero_length_key_is_addressable() {
    let trie = Trie::new_in_memory();
    trie.put(b"", b"root-value".to_vec()).await.unwrap();
    assert_eq!(trie.get(b"").await.unwrap(), Some(b"root-value".to_vec()));
}

#[tokio::test]
async fn inline_and_hashed_nodes_both_round_trip_across_the_32_byte_boundary() {
    let trie = Trie::new_in_memory();
    trie.put(b"short", vec![0u8; 4]).await.unwrap();
    trie.put(b"long", vec![0u8; 64]).await.unwrap();
    assert_eq!(trie.get(b"short").await.unwrap(), Some(vec![0u8; 4]));
    assert_eq!(trie.get(b"long").await.unwrap(), Some(vec![0u8; 64]));
}

#[tokio::test]
async fn batch_of_mixed_puts_and_deletes_is_order_independent() {
    let trie = Trie::new_in_memory();
    trie.put(b"keep", b"1".to_vec()).await.unwrap();
    trie.put(b"remove", b"2".to_vec()).await.unwrap();

    let root = trie
        .batch(vec![(b"remove".to_vec(), Op::Delete), (b"add".to_vec(), Op::Put(b"3".to_vec()))])
        .await
        .unwrap();

    assert_eq!(trie.get(b"keep").await.unwrap(), Some(b"1".to_vec()));
    assert_eq!(trie.get(b"remove").await.unwrap(), None);
    assert_eq!(trie.get(b"add").await.unwrap(), Some(b"3".to_vec()));
    assert_eq!(trie.root().await, root);
}
