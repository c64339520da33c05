//! Integration tests for the shared mempool

#[cfg(test)]
mod tests {
    use shmipc::{PoolConfig, RingConfig, ShmIpcError, ShmMempool, ShmRing};

    fn pool_config(dir: &tempfile::TempDir, name: &str, element_size: u32, capacity: u32) -> PoolConfig {
        PoolConfig::new(name, element_size, capacity).with_file_path(dir.path().join(name))
    }

    #[test]
    fn test_capacity_admission_and_reuse() {
        // capacity 4: three claims succeed, the fourth is rejected,
        // freeing one admits the next
        let dir = tempfile::tempdir().unwrap();
        let pool = ShmMempool::create_or_attach(pool_config(&dir, "scenario_b", 64, 4)).unwrap();

        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        let c = pool.alloc().unwrap();
        assert!(matches!(
            pool.alloc().unwrap_err(),
            ShmIpcError::PoolFull { .. }
        ));

        pool.free(a).unwrap();
        let d = pool.alloc().unwrap();

        for element in [b, c, d] {
            pool.free(element).unwrap();
        }
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_element_handoff_between_attachments() {
        // producer and consumer sides attach the same pool and exchange
        // elements by slot index over a ring
        let dir = tempfile::tempdir().unwrap();
        let pool_cfg = pool_config(&dir, "handoff_pool", 256, 16);
        let ring_cfg = RingConfig::new("handoff_ring", 16)
            .with_file_path(dir.path().join("handoff_ring"));

        let producer_pool = ShmMempool::create_or_attach(pool_cfg.clone()).unwrap();
        let consumer_pool = ShmMempool::create_or_attach(pool_cfg).unwrap();
        let ring: ShmRing<u32> = ShmRing::create_or_attach(ring_cfg).unwrap();

        for message in [&b"first"[..], &b"second"[..], &b"third"[..]] {
            let mut element = producer_pool.alloc().unwrap();
            element.write(message).unwrap();
            element.set_status(1);
            assert!(ring.enqueue(element.index()));
        }
        assert_eq!(producer_pool.outstanding(), 3);

        let mut received = Vec::new();
        while let Some(index) = ring.dequeue() {
            let element = consumer_pool.get(index).unwrap();
            assert_eq!(element.status(), 1);
            received.push(element.payload().to_vec());
            consumer_pool.free(element).unwrap();
        }

        assert_eq!(received, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
        assert_eq!(producer_pool.outstanding(), 0);
        assert_eq!(consumer_pool.outstanding(), 0);
    }

    #[test]
    fn test_attach_rejects_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let config = pool_config(&dir, "shape", 64, 8);
        let _pool = ShmMempool::create_or_attach(config.clone()).unwrap();

        let mut wrong = config;
        wrong.element_size = 128;
        let err = ShmMempool::create_or_attach(wrong).unwrap_err();
        assert!(matches!(err, ShmIpcError::RegionMismatch { .. }));
    }

    #[test]
    fn test_freed_slot_is_reusable_after_wrap() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ShmMempool::create_or_attach(pool_config(&dir, "reuse", 32, 4)).unwrap();

        // hold slot 0 claimed while the cursor wraps past it
        let held = pool.alloc().unwrap();
        assert_eq!(held.index(), 0);

        for _ in 0..3 {
            let element = pool.alloc().unwrap();
            pool.free(element).unwrap();
        }

        // cursor is back on slot 0, which is still claimed
        let err = pool.alloc().unwrap_err();
        assert!(matches!(err, ShmIpcError::SlotCollision { slot: 0 }));
        // collision rolled the admission count back
        assert_eq!(pool.outstanding(), 1);

        pool.free(held).unwrap();
        let element = pool.alloc().unwrap();
        assert_eq!(element.index(), 1);
        pool.free(element).unwrap();
    }

    #[test]
    fn test_dump_format() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ShmMempool::create_or_attach(pool_config(&dir, "dumppool", 128, 8)).unwrap();

        let element = pool.alloc().unwrap();
        let text = format!("{}", pool.stats());
        assert!(text.contains("mempool <dumppool>"));
        assert!(text.contains("capacity=8"));
        assert!(text.contains("used=1"));
        pool.free(element).unwrap();
    }

    #[test]
    fn test_destroy_removes_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = pool_config(&dir, "cleanup", 64, 8);
        let path = dir.path().join("cleanup");

        let pool = ShmMempool::create_or_attach(config).unwrap();
        assert!(path.exists());
        pool.destroy().unwrap();
        assert!(!path.exists());
    }
}
