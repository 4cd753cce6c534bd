//! 错误类型

/// alertgram 的错误分类
///
/// - 配置错误只在构造时出现
/// - 输入错误返回给直接调用方
/// - 投递错误由转发层记录日志后吞掉
/// - 渲染错误经由通知器向上传播
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration is invalid: {0}")]
    InvalidConfiguration(String),

    #[error("invalid alert group: {0}")]
    InvalidAlertGroup(String),

    #[error("error rendering template: {0}")]
    RenderTemplate(String),

    /// 与外部通知后端通信失败
    #[error("error communicating with {backend}: {message}")]
    Communication {
        backend: &'static str,
        message: String,
    },

    /// 上游 webhook 数据无法解码
    #[error("can't deserialize the received alerts: {0}")]
    Decode(String),
}

impl Error {
    /// 是否属于调用方的错误（配置或输入）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfiguration(_) | Error::InvalidAlertGroup(_) | Error::Decode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
