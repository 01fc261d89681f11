//! 环形上传缓冲的游标逻辑
//!
//! 固定容量的字节环形区，用于暂存每帧的小规模 CPU→GPU 传输
//! （常量、顶点/索引数据），避免逐次分配。
//!
//! 分配向上取整到 256 字节对齐；当对齐后的大小放不下剩余空间时，
//! 游标回绕到 0 再分配。环形区本身不做占用跟踪——回绕不会与飞行
//! 中的帧冲突这一点，由启动时的容量余量校验保证
//! （见 `Config::validate`）。单次分配超过总容量是受检错误。

use crate::core::error::{GraphicsError, Result};

/// 上传分配的对齐粒度（D3D12 常量缓冲区要求 256 字节对齐）
pub const UPLOAD_ALIGNMENT: u64 = 256;

/// 环形分配器：只负责游标运算，不持有任何 GPU 资源
#[derive(Debug)]
pub struct RingAllocator {
    capacity: u64,
    cursor: u64,
}

impl RingAllocator {
    /// # Panics
    ///
    /// `capacity` 为 0 时 panic（配置校验阶段已排除）。
    pub fn new(capacity: u64) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        debug_assert!(capacity % UPLOAD_ALIGNMENT == 0, "capacity must be aligned");
        Self {
            capacity,
            cursor: 0,
        }
    }

    /// 将大小向上取整到对齐边界
    pub fn align_up(size: u64) -> u64 {
        (size + (UPLOAD_ALIGNMENT - 1)) & !(UPLOAD_ALIGNMENT - 1)
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// 分配 `size` 字节，返回写入偏移
    ///
    /// 对齐后的大小放不下时游标回绕到 0；对齐后仍超过总容量时
    /// 返回 `CapacityExceeded` 而不是静默损坏数据。
    pub fn allocate(&mut self, size: u64) -> Result<u64> {
        let aligned = Self::align_up(size);
        if aligned > self.capacity {
            return Err(GraphicsError::CapacityExceeded {
                what: "upload ring",
                requested: aligned,
                capacity: self.capacity,
            }
            .into());
        }

        if self.cursor + aligned > self.capacity {
            self.cursor = 0;
        }

        let offset = self.cursor;
        self.cursor = (self.cursor + aligned) % self.capacity;
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LumeRenderError;

    #[test]
    fn test_align_up() {
        assert_eq!(RingAllocator::align_up(0), 0);
        assert_eq!(RingAllocator::align_up(1), 256);
        assert_eq!(RingAllocator::align_up(256), 256);
        assert_eq!(RingAllocator::align_up(257), 512);
        assert_eq!(RingAllocator::align_up(600), 768);
    }

    #[test]
    fn test_wrap_scenario() {
        // capacity=1024：allocate(100) -> 0，游标 256；
        // allocate(200) -> 256，游标 512；
        // allocate(600) 对齐后 768 放不下 -> 回绕，返回 0，游标 768
        let mut ring = RingAllocator::new(1024);

        assert_eq!(ring.allocate(100).unwrap(), 0);
        assert_eq!(ring.cursor(), 256);

        assert_eq!(ring.allocate(200).unwrap(), 256);
        assert_eq!(ring.cursor(), 512);

        assert_eq!(ring.allocate(600).unwrap(), 0);
        assert_eq!(ring.cursor(), 768);
    }

    #[test]
    fn test_offsets_increase_until_wrap() {
        // 回绕前：累计对齐大小不超过容量时偏移严格递增且互不重叠
        let mut ring = RingAllocator::new(4096);
        let mut last_end = 0u64;
        for size in [64, 300, 256, 1000] {
            let offset = ring.allocate(size).unwrap();
            assert!(offset >= last_end);
            last_end = offset + RingAllocator::align_up(size);
        }
        assert!(last_end <= 4096);
    }

    #[test]
    fn test_exact_fit_wraps_cursor_to_zero() {
        let mut ring = RingAllocator::new(512);
        assert_eq!(ring.allocate(512).unwrap(), 0);
        assert_eq!(ring.cursor(), 0);
        assert_eq!(ring.allocate(256).unwrap(), 0);
        assert_eq!(ring.cursor(), 256);
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn test_zero_capacity_is_rejected() {
        // 游标运算对容量取模，零容量不允许建出来
        RingAllocator::new(0);
    }

    #[test]
    fn test_oversized_allocation_is_reported() {
        let mut ring = RingAllocator::new(1024);
        match ring.allocate(2000) {
            Err(LumeRenderError::Graphics(GraphicsError::CapacityExceeded {
                what,
                requested,
                capacity,
            })) => {
                assert_eq!(what, "upload ring");
                assert_eq!(requested, 2048);
                assert_eq!(capacity, 1024);
            }
            other => panic!("expected CapacityExceeded, got {:?}", other),
        }
        // 失败的分配不移动游标
        assert_eq!(ring.cursor(), 0);
    }
}
