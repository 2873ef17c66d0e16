use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 流水线无法继续
    #[error("流水线错误: {0}")]
    Pipeline(#[from] PipelineError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 流水线级错误：只有在整批无法继续时才会出现
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 图片目录不存在
    #[error("图片目录不存在: {path}")]
    ImageFolderNotFound { path: String },
    /// 读取图片目录失败
    #[error("读取图片目录失败 ({path}): {source}")]
    ImageFolderUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 工作目录不可写
    #[error("工作目录不可写 ({path}): {source}")]
    WorkFolderNotWritable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 上传错误
#[derive(Debug, Error)]
pub enum UploadError {
    /// 读取待上传文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 网络请求失败
    #[error("上传请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 服务返回错误响应
    #[error("上传服务返回错误 ({endpoint}): status={status}, message={message}")]
    BadResponse {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// 服务没有返回可用的句柄
    #[error("上传服务未返回文件句柄 ({endpoint})")]
    MissingHandle { endpoint: String },
}

/// 批量生成错误
#[derive(Debug, Error)]
pub enum GenerationError {
    /// 构建请求失败
    #[error("构建请求失败: {0}")]
    RequestBuild(String),
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 字段取值非法
    #[error("配置项 {field} 非法: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// 单个响应块解析失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockParseError {
    /// 编号无法识别
    #[error("无法识别的图片编号 '{0}'")]
    InvalidNumber(String),
}

// ========== 便捷构造函数 ==========

impl UploadError {
    /// 创建上传请求失败错误
    pub fn request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        UploadError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }
}

impl GenerationError {
    /// 创建 LLM API 调用错误
    pub fn api_call_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        GenerationError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
