use super::{ObjectStore, PutBody, PutOptions, RemoteObject, DELETE_BATCH_MAX};
use crate::settings::{EncryptionMethod, StoreSettings};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectCannedAcl, ObjectIdentifier, StorageClass};
use aws_sdk_s3::Client;
use std::collections::HashMap;
use std::time::Duration;

/// 非 IO 操作超时（秒）- 单次请求尝试
const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- 含重试的整体上限
const IO_TIMEOUT_SECS: u64 = 300;

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    sse: SseParams,
    name: String,
}

/// 连接级 SSE-C 参数，附加到每个对象请求
#[derive(Clone, Default)]
struct SseParams {
    algorithm: Option<&'static str>,
    key: Option<String>,
    key_md5: Option<String>,
}

impl S3ObjectStore {
    pub async fn new(settings: &StoreSettings) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(IO_TIMEOUT_SECS))
            .operation_attempt_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
            .build();

        let mut builder = if settings.has_static_credentials() {
            let credentials = Credentials::new(
                settings.access_key.clone(),
                settings.secret_key.clone(),
                settings.session_token.clone(),
                None,
                "bucketsync",
            );
            aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(credentials)
        } else {
            // 没有静态密钥时走环境凭证链
            let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
            aws_sdk_s3::config::Builder::from(&shared)
        };

        builder = builder
            .region(Region::new(settings.region.clone()))
            .timeout_config(timeouts);

        if let Some(ref endpoint) = settings.endpoint {
            // S3 兼容服务通常要求 path-style
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        let sse = match settings.encryption_method {
            EncryptionMethod::Aes256 => SseParams {
                algorithm: Some("AES256"),
                key: settings.encryption_key.clone(),
                key_md5: settings.encryption_key_md5.clone(),
            },
            EncryptionMethod::None if settings.encryption_key.is_some() => SseParams {
                algorithm: Some("AES256"),
                key: settings.encryption_key.clone(),
                key_md5: settings.encryption_key_md5.clone(),
            },
            EncryptionMethod::None => SseParams::default(),
        };

        let name = format!("s3://{}", settings.bucket);

        Self {
            client,
            bucket: settings.bucket.clone(),
            sse,
            name,
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;

        tracing::debug!("列举对象: bucket={}, prefix={:?}", self.bucket, prefix);

        // 循环续页标记直到列完
        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);

            if !prefix.is_empty() {
                request = request.prefix(prefix);
            }
            if let Some(t) = token.take() {
                request = request.continuation_token(t);
            }

            let response = request.send().await?;

            for item in response.contents() {
                let Some(key) = item.key() else { continue };
                objects.push(RemoteObject {
                    key: key.to_string(),
                    etag: item.e_tag().map(str::to_string),
                    last_modified: item.last_modified().map_or(0, |t| t.secs()),
                    size: item.size().unwrap_or(0) as u64,
                    storage_class: item.storage_class().map(|c| c.as_str().to_string()),
                });
            }

            if response.is_truncated().unwrap_or(false) {
                token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        tracing::debug!("列举完成: {} 个对象", objects.len());
        Ok(objects)
    }

    async fn put_object(&self, key: &str, body: PutBody, opts: &PutOptions) -> Result<()> {
        let stream = match body {
            PutBody::Bytes(data) => ByteStream::from(data),
            // 流式读取，分块与否交给客户端
            PutBody::File(path) => ByteStream::from_path(&path).await?,
        };

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(stream);

        if let Some(ref v) = opts.content_type {
            request = request.content_type(v);
        }
        if let Some(ref v) = opts.content_encoding {
            request = request.content_encoding(v);
        }
        if let Some(v) = opts.content_length {
            request = request.content_length(v);
        }
        if let Some(ref v) = opts.cache_control {
            request = request.cache_control(v);
        }
        if let Some(ref v) = opts.content_md5 {
            request = request.content_md5(v);
        }
        if let Some(acl) = opts.canned_acl {
            request = request.acl(ObjectCannedAcl::from(acl.as_str()));
        }
        if let Some(class) = opts.storage_class {
            request = request.storage_class(StorageClass::from(class.as_str()));
        }
        if !opts.metadata.is_empty() {
            request = request.set_metadata(Some(opts.metadata.clone()));
        }

        // 透传头只应用存储端认识的键
        for (header, value) in &opts.headers {
            match header.to_ascii_lowercase().as_str() {
                "content-type" => request = request.content_type(value),
                "content-encoding" => request = request.content_encoding(value),
                "content-disposition" => request = request.content_disposition(value),
                "content-language" => request = request.content_language(value),
                "cache-control" => request = request.cache_control(value),
                other => {
                    tracing::debug!("忽略不支持的透传头: {}", other);
                }
            }
        }

        if let Some(algorithm) = self.sse.algorithm {
            request = request.sse_customer_algorithm(algorithm);
            if let Some(ref k) = self.sse.key {
                request = request.sse_customer_key(k);
            }
            if let Some(ref m) = self.sse.key_md5 {
                request = request.sse_customer_key_md5(m);
            }
        }

        request.send().await?;
        Ok(())
    }

    async fn get_object(
        &self,
        key: &str,
        version: Option<&str>,
    ) -> Result<Option<(Vec<u8>, RemoteObject)>> {
        let mut request = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(v) = version {
            request = request.version_id(v);
        }
        if let Some(algorithm) = self.sse.algorithm {
            request = request.sse_customer_algorithm(algorithm);
            if let Some(ref k) = self.sse.key {
                request = request.sse_customer_key(k);
            }
            if let Some(ref m) = self.sse.key_md5 {
                request = request.sse_customer_key_md5(m);
            }
        }

        match request.send().await {
            Ok(response) => {
                let object = RemoteObject {
                    key: key.to_string(),
                    etag: response.e_tag().map(str::to_string),
                    last_modified: response.last_modified().map_or(0, |t| t.secs()),
                    size: response.content_length().unwrap_or(0) as u64,
                    storage_class: response.storage_class().map(|c| c.as_str().to_string()),
                };
                let data = response.body.collect().await?.into_bytes().to_vec();
                Ok(Some((data, object)))
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    tracing::debug!("对象不存在: {}", key);
                    Ok(None)
                } else {
                    Err(anyhow!(service_error))
                }
            }
        }
    }

    async fn head_object(&self, key: &str, version: Option<&str>) -> Result<Option<RemoteObject>> {
        let mut request = self.client.head_object().bucket(&self.bucket).key(key);
        if let Some(v) = version {
            request = request.version_id(v);
        }
        if let Some(algorithm) = self.sse.algorithm {
            request = request.sse_customer_algorithm(algorithm);
            if let Some(ref k) = self.sse.key {
                request = request.sse_customer_key(k);
            }
            if let Some(ref m) = self.sse.key_md5 {
                request = request.sse_customer_key_md5(m);
            }
        }

        match request.send().await {
            Ok(response) => Ok(Some(RemoteObject {
                key: key.to_string(),
                etag: response.e_tag().map(str::to_string),
                last_modified: response.last_modified().map_or(0, |t| t.secs()),
                size: response.content_length().unwrap_or(0) as u64,
                storage_class: response.storage_class().map(|c| c.as_str().to_string()),
            })),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    tracing::debug!("对象不存在: {}", key);
                    Ok(None)
                } else {
                    Err(anyhow!(service_error))
                }
            }
        }
    }

    async fn get_object_metadata(
        &self,
        key: &str,
        version: Option<&str>,
    ) -> Result<Option<HashMap<String, String>>> {
        let mut request = self.client.head_object().bucket(&self.bucket).key(key);
        if let Some(v) = version {
            request = request.version_id(v);
        }

        match request.send().await {
            Ok(response) => Ok(Some(response.metadata().cloned().unwrap_or_default())),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(None)
                } else {
                    Err(anyhow!(service_error))
                }
            }
        }
    }

    async fn delete_object(&self, key: &str, version: Option<&str>) -> Result<()> {
        let mut request = self.client.delete_object().bucket(&self.bucket).key(key);
        if let Some(v) = version {
            request = request.version_id(v);
        }
        // 删除不存在的对象不报错
        request.send().await?;
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        if keys.len() > DELETE_BATCH_MAX {
            return Err(anyhow!("单次批量删除最多 {} 个 key", DELETE_BATCH_MAX));
        }

        let identifiers = keys
            .iter()
            .map(|k| ObjectIdentifier::builder().key(k).build())
            .collect::<Result<Vec<_>, _>>()?;

        let delete = Delete::builder().set_objects(Some(identifiers)).build()?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await?;

        Ok(())
    }

    async fn presign_get(
        &self,
        key: &str,
        version: Option<&str>,
        expires_secs: u64,
    ) -> Result<String> {
        let mut request = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(v) = version {
            request = request.version_id(v);
        }

        let config = PresigningConfig::expires_in(Duration::from_secs(expires_secs))?;
        let presigned = request.presigned(config).await?;

        Ok(presigned.uri().to_string())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
