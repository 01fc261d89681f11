//! GPU 同步机制模块
//!
//! 提供帧生命周期的同步原语：单调递增的提交计数、每槽位 fence 记录、
//! present 的有界背压等待目标计算。
//!
//! # 设计原则
//!
//! - **Fence 同步**：CPU 通过 fence 的已完成值观察 GPU 进度
//! - **有界飞行帧**：最多允许 `buffer_count` 帧在飞行中，超出时
//!   present 必须阻塞等待
//! - **纯逻辑**：本模块不触碰图形 API，可以用模拟 fence 完整测试

/// Fence 值
///
/// 用于 CPU-GPU 同步的单调递增值。
/// CPU 可以等待 GPU 完成特定 Fence 值对应的工作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FenceValue(u64);

impl FenceValue {
    /// 创建新的 Fence 值
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// 获取内部值
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// present 一帧所需的同步信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentSync {
    /// 本帧在命令队列上 signal 的值
    pub signal: FenceValue,
    /// 若 GPU 落后超过缓冲深度，需要阻塞等待到的目标值
    pub wait_target: Option<FenceValue>,
}

/// 帧时间线
///
/// 跟踪提交计数（帧计数器）、当前分配器槽位以及每个槽位最近一次
/// 提交的 fence 值。fence 的初始值为 `buffer_count`，提交计数从
/// `buffer_count + 1` 开始，这样前 `buffer_count` 帧不会触发等待。
///
/// # 示例
///
/// ```
/// use lume_render::renderer::sync::FrameTimeline;
///
/// let mut timeline = FrameTimeline::new(3);
/// let completed = timeline.initial_fence_value();
/// let sync = timeline.on_present(completed);
/// assert!(sync.wait_target.is_none());
/// ```
#[derive(Debug)]
pub struct FrameTimeline {
    /// 缓冲帧数（飞行中帧数上限）
    buffer_count: u64,
    /// 下一次 signal 的值，每提交一帧递增一次，从不回退
    execute_count: u64,
    /// 当前分配器槽位（frame_counter mod buffer_count）
    execute_index: usize,
    /// 每个槽位最近一次提交的 fence 值（0 表示从未使用）
    slot_fences: Vec<u64>,
}

impl FrameTimeline {
    /// 创建新的帧时间线
    ///
    /// # Panics
    ///
    /// `buffer_count` 为 0 时 panic（配置校验阶段已排除）。
    pub fn new(buffer_count: u32) -> Self {
        assert!(buffer_count > 0, "buffer_count must be positive");
        Self {
            buffer_count: u64::from(buffer_count),
            execute_count: u64::from(buffer_count) + 1,
            execute_index: 0,
            slot_fences: vec![0; buffer_count as usize],
        }
    }

    /// fence 对象应当以此值创建
    pub fn initial_fence_value(&self) -> u64 {
        self.buffer_count
    }

    /// 缓冲帧数
    pub fn buffer_count(&self) -> u32 {
        self.buffer_count as u32
    }

    /// 当前分配器槽位索引
    pub fn execute_index(&self) -> usize {
        self.execute_index
    }

    /// 下一次提交将要 signal 的值（当前帧计数）
    pub fn current_signal(&self) -> FenceValue {
        FenceValue::new(self.execute_count)
    }

    /// 当前槽位上一次提交的 fence 值
    ///
    /// begin 在重置该槽位的命令分配器之前，必须确认此值已完成，
    /// 否则 GPU 可能仍在执行引用该分配器内存的命令。
    pub fn slot_fence(&self) -> Option<FenceValue> {
        let value = self.slot_fences[self.execute_index];
        (value != 0).then(|| FenceValue::new(value))
    }

    /// 提交一帧：记录槽位 fence，推进槽位与帧计数
    ///
    /// 返回本帧的 signal 值，以及在 `completed`（调用时观察到的
    /// fence 已完成值）落后超过 `buffer_count` 帧时需要等待的目标。
    /// 等待目标为 `signal - buffer_count`，等待完成后飞行中的帧数
    /// 恰好回到 `buffer_count` 以内。
    pub fn on_present(&mut self, completed: u64) -> PresentSync {
        let signal = self.execute_count;
        self.slot_fences[self.execute_index] = signal;
        self.execute_index = (self.execute_index + 1) % self.buffer_count as usize;

        let target = signal - self.buffer_count;
        let wait_target = (completed < target).then(|| FenceValue::new(target));

        self.execute_count += 1;
        PresentSync {
            signal: FenceValue::new(signal),
            wait_target,
        }
    }

    /// 完整排空：返回需要 signal 并无条件等待的值
    ///
    /// 用于关闭与交换链重建前的 wait-for-idle。
    pub fn on_idle(&mut self) -> FenceValue {
        let signal = self.execute_count;
        self.execute_count += 1;
        FenceValue::new(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 模拟 fence：只记录 GPU 已完成的值
    struct MockFence {
        completed: u64,
    }

    impl MockFence {
        fn new(initial: u64) -> Self {
            Self { completed: initial }
        }

        /// 模拟一次 present + 等待流程，返回是否发生了阻塞
        fn present(&mut self, timeline: &mut FrameTimeline) -> bool {
            let sync = timeline.on_present(self.completed);
            match sync.wait_target {
                Some(target) if self.completed < target.value() => true,
                _ => false,
            }
        }
    }

    #[test]
    fn test_fence_value_ordering() {
        let f1 = FenceValue::new(1);
        let f2 = FenceValue::new(2);
        assert!(f1 < f2);
        assert_eq!(f1, FenceValue::new(1));
    }

    #[test]
    fn test_initial_state() {
        let timeline = FrameTimeline::new(3);
        assert_eq!(timeline.initial_fence_value(), 3);
        assert_eq!(timeline.current_signal().value(), 4);
        assert_eq!(timeline.execute_index(), 0);
        assert!(timeline.slot_fence().is_none());
    }

    #[test]
    fn test_present_blocks_after_buffer_count_frames() {
        // buffer_count=3：GPU 没有任何完成信号时，第 1..=3 次 present
        // 不阻塞，第 4 次必须阻塞
        let mut timeline = FrameTimeline::new(3);
        let mut fence = MockFence::new(timeline.initial_fence_value());

        assert!(!fence.present(&mut timeline));
        assert!(!fence.present(&mut timeline));
        assert!(!fence.present(&mut timeline));
        assert!(fence.present(&mut timeline));

        // GPU 完成一帧后解除阻塞
        let sync = timeline.on_present(fence.completed);
        let target = sync.wait_target.expect("still trailing");
        fence.completed = target.value();
        assert!(fence.completed >= target.value());
    }

    #[test]
    fn test_signal_values_monotonic() {
        let mut timeline = FrameTimeline::new(2);
        let s1 = timeline.on_present(u64::MAX).signal.value();
        let s2 = timeline.on_present(u64::MAX).signal.value();
        let idle = timeline.on_idle().value();
        assert!(s1 < s2 && s2 < idle);
    }

    #[test]
    fn test_slot_rotation() {
        let mut timeline = FrameTimeline::new(3);
        assert_eq!(timeline.execute_index(), 0);
        timeline.on_present(u64::MAX);
        assert_eq!(timeline.execute_index(), 1);
        timeline.on_present(u64::MAX);
        assert_eq!(timeline.execute_index(), 2);
        timeline.on_present(u64::MAX);
        assert_eq!(timeline.execute_index(), 0);

        // 槽位 0 的 fence 记录的是第一帧的 signal 值
        assert_eq!(timeline.slot_fence().map(|f| f.value()), Some(4));
    }

    #[test]
    fn test_wait_target_bounds_frames_in_flight() {
        let mut timeline = FrameTimeline::new(2);
        let completed = timeline.initial_fence_value();
        // signal=3, target=1: 已完成 2 >= 1
        assert!(timeline.on_present(completed).wait_target.is_none());
        // signal=4, target=2: 已完成 2 >= 2
        assert!(timeline.on_present(completed).wait_target.is_none());
        // signal=5, target=3: 已完成 2 < 3，必须等待
        let sync = timeline.on_present(completed);
        assert_eq!(sync.wait_target.map(|f| f.value()), Some(3));
    }
}
