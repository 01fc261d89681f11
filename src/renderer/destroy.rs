//! 延迟资源销毁模块
//!
//! GPU 对象被替换（例如调整窗口大小、网格重建）时不能立即释放：
//! 飞行中的命令列表可能仍在引用它。本模块把对象与其退役时的帧计数
//! 配对放入 FIFO 队列，只有在 fence 的已完成值追上该帧后才真正释放。
//!
//! 条目按帧计数递增的顺序入队、按同样的顺序出队，因此回收时只需
//! 从队首逐个检查，遇到第一个不满足条件的条目即可停止。

use std::collections::VecDeque;

/// 等待销毁的条目：对象句柄与退役时的帧计数
#[derive(Debug)]
struct PendingDestroy<T> {
    destroy_frame: u64,
    resource: T,
}

/// 延迟销毁队列
///
/// `retire` 入队，`reclaim` 在每次 present/排空后以最新观察到的
/// fence 已完成值调用一次。任何条目都不会被跳过或提前释放。
#[derive(Debug)]
pub struct DelayDestroyQueue<T> {
    queue: VecDeque<PendingDestroy<T>>,
}

impl<T> DelayDestroyQueue<T> {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// 将对象标记为在 `frame` 帧退役，等待延迟释放
    pub fn retire(&mut self, resource: T, frame: u64) {
        debug_assert!(
            self.queue.back().map_or(true, |p| p.destroy_frame <= frame),
            "retire frames must be non-decreasing"
        );
        self.queue.push_back(PendingDestroy {
            destroy_frame: frame,
            resource,
        });
    }

    /// 释放所有退役帧 <= `completed_frame` 的条目，返回释放数量
    ///
    /// FIFO 顺序保证：一旦遇到尚不满足条件的条目，其后所有条目的
    /// 退役帧只会更大，直接停止。
    pub fn reclaim(&mut self, completed_frame: u64) -> usize {
        let mut released = 0;
        while let Some(front) = self.queue.front() {
            if front.destroy_frame <= completed_frame {
                drop(self.queue.pop_front());
                released += 1;
            } else {
                break;
            }
        }
        released
    }

    /// 无条件释放所有条目，返回释放数量
    ///
    /// 只能在完整的 GPU 排空之后调用（关闭流程）。
    pub fn flush_all(&mut self) -> usize {
        let released = self.queue.len();
        self.queue.clear();
        released
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T> Default for DelayDestroyQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// 析构时把自己的编号记录到共享的销毁轨迹里
    struct Traced {
        id: u32,
        trace: Rc<RefCell<Vec<u32>>>,
    }

    impl Drop for Traced {
        fn drop(&mut self) {
            self.trace.borrow_mut().push(self.id);
        }
    }

    fn traced(id: u32, trace: &Rc<RefCell<Vec<u32>>>) -> Traced {
        Traced {
            id,
            trace: Rc::clone(trace),
        }
    }

    #[test]
    fn test_reclaim_releases_only_eligible_entries() {
        // retire frame 5、frame 7；reclaim(5) 只释放 frame-5 条目，
        // reclaim(7) 释放 frame-7 条目，reclaim(4) 什么都不释放
        let trace = Rc::new(RefCell::new(Vec::new()));
        let mut queue = DelayDestroyQueue::new();

        queue.retire(traced(1, &trace), 5);
        queue.retire(traced(2, &trace), 7);

        assert_eq!(queue.reclaim(4), 0);
        assert_eq!(queue.len(), 2);
        assert!(trace.borrow().is_empty());

        assert_eq!(queue.reclaim(5), 1);
        assert_eq!(*trace.borrow(), vec![1]);

        assert_eq!(queue.reclaim(7), 1);
        assert_eq!(*trace.borrow(), vec![1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_reclaim_is_fifo() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let mut queue = DelayDestroyQueue::new();
        for (id, frame) in [(1, 3), (2, 3), (3, 4), (4, 6)] {
            queue.retire(traced(id, &trace), frame);
        }

        assert_eq!(queue.reclaim(4), 3);
        assert_eq!(*trace.borrow(), vec![1, 2, 3]);

        // frame > completed 的条目不受影响
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.reclaim(5), 0);
    }

    #[test]
    fn test_flush_all_releases_everything() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let mut queue = DelayDestroyQueue::new();
        queue.retire(traced(1, &trace), 10);
        queue.retire(traced(2, &trace), 20);

        // 关闭流程：完整排空后无条件释放，不看帧号
        assert_eq!(queue.flush_all(), 2);
        assert_eq!(*trace.borrow(), vec![1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_resize_releases_previous_swapchain_handles_exactly_once() {
        // 交换链重建：旧的后台缓冲句柄在 GPU 排空后全部退役，
        // 每个句柄在销毁轨迹中恰好出现一次
        let trace = Rc::new(RefCell::new(Vec::new()));
        let mut queue = DelayDestroyQueue::new();

        let idle_frame = 9;
        for id in [100, 101, 102] {
            queue.retire(traced(id, &trace), idle_frame);
        }
        assert_eq!(queue.reclaim(idle_frame), 3);

        let released = trace.borrow().clone();
        assert_eq!(released, vec![100, 101, 102]);
        // 再次回收不会重复释放
        assert_eq!(queue.reclaim(u64::MAX), 0);
        assert_eq!(trace.borrow().len(), 3);
    }
}
