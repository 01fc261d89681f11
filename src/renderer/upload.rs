//! 上传请求队列
//!
//! CPU 侧产生的资源更新（字体图集、网格数据）先进入本队列，
//! 每帧录制命令前由帧驱动一次性取出，按入队顺序执行。
//! 队列内部用互斥锁保护，允许其他线程投递请求；消费方只有
//! 提交线程一个。
//!
//! 队列只携带原始字节与目标句柄，不持有任何 GPU 对象。

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::resources::{MeshHandle, TextureHandle};

/// 像素格式
///
/// 只列出上传路径实际出现的格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 每通道 8 位 RGBA
    Rgba8Unorm,
    /// 单通道 8 位
    R8Unorm,
}

impl PixelFormat {
    /// 每像素位数，用于计算上传区域的字节大小
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgba8Unorm => 32,
            PixelFormat::R8Unorm => 8,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        self.bits_per_pixel() / 8
    }
}

/// 网格上传的目标槽
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshChannel {
    /// 顶点数据，携带输入槽序号与顶点字节跨度
    Vertices { slot: u32, stride: u32 },
    /// 32 位索引数据
    Indices,
}

/// 一条上传请求
///
/// 纹理与网格请求共用一个记录类型；`texture` 与 `mesh` 恰有一个为 `Some`。
#[derive(Debug)]
pub struct UploadRequest {
    pub texture: Option<TextureHandle>,
    pub mesh: Option<(MeshHandle, MeshChannel)>,
    /// 原始字节，纹理为紧密排列的像素行
    pub data: Vec<u8>,
    pub format: PixelFormat,
    /// 纹理行字节跨度
    pub row_stride: u32,
    /// 目标子区域左上角；`None` 表示整张纹理
    pub origin: Option<(u32, u32)>,
    pub width: u32,
    pub height: u32,
}

impl UploadRequest {
    /// 整张纹理上传
    pub fn texture(
        handle: TextureHandle,
        data: Vec<u8>,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            texture: Some(handle),
            mesh: None,
            row_stride: width * format.bytes_per_pixel(),
            data,
            format,
            origin: None,
            width,
            height,
        }
    }

    /// 纹理子区域上传（字体图集增量更新）
    pub fn texture_region(
        handle: TextureHandle,
        data: Vec<u8>,
        format: PixelFormat,
        origin: (u32, u32),
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            texture: Some(handle),
            mesh: None,
            row_stride: width * format.bytes_per_pixel(),
            data,
            format,
            origin: Some(origin),
            width,
            height,
        }
    }

    /// 网格数据上传
    pub fn mesh(handle: MeshHandle, channel: MeshChannel, data: Vec<u8>) -> Self {
        Self {
            texture: None,
            mesh: Some((handle, channel)),
            data,
            format: PixelFormat::R8Unorm,
            row_stride: 0,
            origin: None,
            width: 0,
            height: 0,
        }
    }
}

/// 线程安全的上传队列
#[derive(Debug, Default)]
pub struct UploadQueue {
    inner: Mutex<VecDeque<UploadRequest>>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 投递一条请求，可从任意线程调用
    pub fn enqueue(&self, request: UploadRequest) {
        self.inner.lock().unwrap().push_back(request);
    }

    /// 取出当前所有请求，保持入队顺序
    pub fn drain(&self) -> Vec<UploadRequest> {
        self.inner.lock().unwrap().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_enqueue_order() {
        let queue = UploadQueue::new();
        queue.enqueue(UploadRequest::texture(
            TextureHandle(1),
            vec![0; 16],
            PixelFormat::Rgba8Unorm,
            2,
            2,
        ));
        queue.enqueue(UploadRequest::mesh(
            MeshHandle(2),
            MeshChannel::Indices,
            vec![0; 12],
        ));
        queue.enqueue(UploadRequest::texture(
            TextureHandle(3),
            vec![0; 4],
            PixelFormat::Rgba8Unorm,
            1,
            1,
        ));

        let drained = queue.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].texture, Some(TextureHandle(1)));
        assert_eq!(drained[1].mesh, Some((MeshHandle(2), MeshChannel::Indices)));
        assert_eq!(drained[2].texture, Some(TextureHandle(3)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_region_request_row_stride() {
        let req = UploadRequest::texture_region(
            TextureHandle(0),
            vec![0; 64 * 8 * 4],
            PixelFormat::Rgba8Unorm,
            (16, 32),
            64,
            8,
        );
        assert_eq!(req.row_stride, 64 * 4);
        assert_eq!(req.origin, Some((16, 32)));
    }

    #[test]
    fn test_bits_per_pixel() {
        assert_eq!(PixelFormat::Rgba8Unorm.bits_per_pixel(), 32);
        assert_eq!(PixelFormat::R8Unorm.bytes_per_pixel(), 1);
    }
}
