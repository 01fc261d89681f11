//! 资源句柄
//!
//! 所有运行期资源都通过小整数句柄引用。句柄在加载阶段由注册表
//! 一次性分配，之后每帧的查找都是数组下标，不再有字符串比较。
//!
//! 句柄只是索引，不携带生命周期信息；持有失效句柄访问注册表
//! 是调用方错误，由注册表的查找接口报告。

/// 纹理句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// 网格句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

/// 管线状态描述句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineHandle(pub u32);

/// 输入布局句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputLayoutHandle(pub u32);

macro_rules! impl_handle_index {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                /// 数组下标
                #[inline]
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

impl_handle_index!(TextureHandle, MeshHandle, PipelineHandle, InputLayoutHandle);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_index() {
        assert_eq!(TextureHandle(7).index(), 7);
        assert_eq!(PipelineHandle(0).index(), 0);
    }

    #[test]
    fn test_handles_are_distinct_types() {
        // 句柄类型互不兼容，编译期即可防止混用；这里只验证相等语义
        assert_eq!(MeshHandle(3), MeshHandle(3));
        assert_ne!(InputLayoutHandle(1), InputLayoutHandle(2));
    }
}
