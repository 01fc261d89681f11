//! 描述符堆的临时分配逻辑
//!
//! 着色器可见的描述符堆是一张固定容量的表；每帧的临时描述符
//! （SRV、临时 RTV）用一个简单的 bump 游标按槽位分配，游标对容量
//! 取模回绕。与环形上传缓冲一样没有占用跟踪，正确性依赖启动时的
//! 容量余量校验：容量相对于每帧消耗 × 缓冲帧深度必须足够大，
//! 使回绕不会覆盖 GPU 仍在读取的描述符。
//!
//! 本模块只做句柄地址运算（基址 + 槽位 × 步长），不触碰 D3D12 API。

/// CPU 侧描述符句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuDescriptorHandle {
    /// 堆内地址
    pub ptr: usize,
    /// 堆内槽位索引
    pub index: u32,
}

/// GPU 侧描述符句柄（仅着色器可见的堆）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuDescriptorHandle {
    pub ptr: u64,
    pub index: u32,
}

/// 描述符环：固定容量表上的 bump 游标
#[derive(Debug)]
pub struct DescriptorRing {
    capacity: u32,
    increment: u32,
    cpu_start: usize,
    gpu_start: Option<u64>,
    cursor: u32,
}

impl DescriptorRing {
    /// # 参数
    ///
    /// * `capacity` - 堆的描述符数量
    /// * `increment` - 单个描述符的字节步长（来自设备查询）
    /// * `cpu_start` - CPU 句柄基址
    /// * `gpu_start` - GPU 句柄基址，仅着色器可见的堆为 `Some`
    ///
    /// # Panics
    ///
    /// `capacity` 为 0 时 panic（配置校验阶段已排除）。
    pub fn new(capacity: u32, increment: u32, cpu_start: usize, gpu_start: Option<u64>) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            capacity,
            increment,
            cpu_start,
            gpu_start,
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// 分配下一个临时槽位，返回 (CPU 句柄, GPU 句柄)
    ///
    /// 游标对容量取模回绕；没有生命周期检查（见模块文档）。
    pub fn allocate_temp(&mut self) -> (CpuDescriptorHandle, Option<GpuDescriptorHandle>) {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.capacity;

        let cpu = CpuDescriptorHandle {
            ptr: self.cpu_start + index as usize * self.increment as usize,
            index,
        };
        let gpu = self.gpu_start.map(|start| GpuDescriptorHandle {
            ptr: start + u64::from(index) * u64::from(self.increment),
            index,
        });
        (cpu, gpu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_advance_by_increment() {
        let mut ring = DescriptorRing::new(64, 32, 0x1000, Some(0x8000));

        let (cpu0, gpu0) = ring.allocate_temp();
        assert_eq!(cpu0.ptr, 0x1000);
        assert_eq!(gpu0.unwrap().ptr, 0x8000);

        let (cpu1, gpu1) = ring.allocate_temp();
        assert_eq!(cpu1.ptr, 0x1000 + 32);
        assert_eq!(cpu1.index, 1);
        assert_eq!(gpu1.unwrap().ptr, 0x8000 + 32);
    }

    #[test]
    fn test_cursor_wraps_modulo_capacity() {
        let mut ring = DescriptorRing::new(4, 32, 0, None);
        for _ in 0..4 {
            ring.allocate_temp();
        }
        assert_eq!(ring.cursor(), 0);

        let (cpu, gpu) = ring.allocate_temp();
        assert_eq!(cpu.index, 0);
        assert_eq!(cpu.ptr, 0);
        assert!(gpu.is_none());
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn test_zero_capacity_is_rejected() {
        DescriptorRing::new(0, 32, 0, None);
    }

    #[test]
    fn test_non_shader_visible_heap_has_no_gpu_handle() {
        let mut ring = DescriptorRing::new(8, 64, 0x2000, None);
        let (_, gpu) = ring.allocate_temp();
        assert!(gpu.is_none());
    }
}
