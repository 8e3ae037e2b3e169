use std::path::Path;
use std::time::Duration;

use criage_schema::{
    ApiResponse, PackageEntry, PackageListResponse, Payload, Platform, Repository, SearchData,
    SearchResult, ServerInfo, Sha256Digest, Statistics, VersionEntry,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::debug;

use super::{RegistryError, ResolvedPackage};
use crate::io::download::stream_to_file;
use crate::rate_limit::RateLimiter;

/// HTTP client for the registry protocol.
///
/// Every request waits on the owned [`RateLimiter`] first. One instance
/// serves any number of repositories.
#[derive(Debug)]
pub struct RegistryClient {
    http: Client,
    limiter: RateLimiter,
}

impl RegistryClient {
    /// Build a client with a per-request timeout and a request rate.
    pub fn new(timeout: Duration, requests_per_second: i64) -> Result<Self, RegistryError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            limiter: RateLimiter::new(requests_per_second),
        })
    }

    /// Stop the rate limiter's refill task.
    pub fn close(&self) {
        self.limiter.close();
    }

    fn api(base: &str, path: &str) -> String {
        format!("{}/api/v1{path}", base.trim_end_matches('/'))
    }

    fn authed(req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token.filter(|t| !t.is_empty()) {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    /// Send a request and decode the response envelope.
    ///
    /// `401` short-circuits to [`RegistryError::Unauthorized`]. A body
    /// that is not an envelope is a decode error on 2xx and a status
    /// error otherwise.
    async fn envelope(&self, req: RequestBuilder) -> Result<(StatusCode, ApiResponse), RegistryError> {
        self.limiter.wait().await;
        let resp = req.send().await?;
        let status = resp.status();
        let url = resp.url().to_string();
        debug!("{status} {url}");

        if status == StatusCode::UNAUTHORIZED {
            return Err(RegistryError::Unauthorized);
        }

        let body = resp.bytes().await?;
        match serde_json::from_slice::<ApiResponse>(&body) {
            Ok(env) => Ok((status, env)),
            Err(e) if status.is_success() => Err(RegistryError::Decode(e)),
            Err(_) => Err(RegistryError::Status {
                status: status.as_u16(),
                url,
            }),
        }
    }

    async fn call<T: Payload>(&self, req: RequestBuilder) -> Result<T, RegistryError> {
        let (_, env) = self.envelope(req).await?;
        Ok(env.into_payload()?)
    }

    /// `GET /packages/{name}`
    pub async fn find_package(&self, repo: &Repository, name: &str) -> Result<PackageEntry, RegistryError> {
        let req = self.http.get(Self::api(&repo.url, &format!("/packages/{name}")));
        match self.envelope(Self::authed(req, repo.auth_token.as_deref())).await {
            Err(RegistryError::Status { status: 404, .. }) => {
                Err(RegistryError::PackageNotFound(name.to_string()))
            }
            Err(e) => Err(e),
            Ok((_, env)) => Ok(env.into_payload()?),
        }
    }

    /// `GET /packages/{name}/{version}`
    pub async fn get_version(
        &self,
        repo: &Repository,
        name: &str,
        version: &str,
    ) -> Result<VersionEntry, RegistryError> {
        let req = self
            .http
            .get(Self::api(&repo.url, &format!("/packages/{name}/{version}")));
        self.call(Self::authed(req, repo.auth_token.as_deref())).await
    }

    /// `GET /packages?page=&limit=`
    pub async fn list_packages(
        &self,
        repo: &Repository,
        page: u32,
        limit: u32,
    ) -> Result<PackageListResponse, RegistryError> {
        let req = self
            .http
            .get(Self::api(&repo.url, "/packages"))
            .query(&[("page", page), ("limit", limit)]);
        self.call(Self::authed(req, repo.auth_token.as_deref())).await
    }

    /// `GET /search?q=`. Hits are tagged with the repository name.
    pub async fn search(&self, repo: &Repository, query: &str) -> Result<Vec<SearchResult>, RegistryError> {
        let req = self
            .http
            .get(Self::api(&repo.url, "/search"))
            .query(&[("q", query)]);
        let data: SearchData = self.call(Self::authed(req, repo.auth_token.as_deref())).await?;
        Ok(data
            .results
            .into_iter()
            .map(|mut r| {
                r.repository.clone_from(&repo.name);
                r
            })
            .collect())
    }

    /// Download URL for one archive.
    pub fn download_url(base: &str, name: &str, version: &str, filename: &str) -> String {
        Self::api(base, &format!("/download/{name}/{version}/{filename}"))
    }

    /// `GET /download/{name}/{version}/{filename}` streamed into `dest`.
    ///
    /// Any status other than 200 is terminal. When `expected` is given the
    /// body is verified before the file appears at `dest`.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        expected: Option<&Sha256Digest>,
        on_progress: impl FnMut(u64, Option<u64>),
    ) -> Result<String, RegistryError> {
        self.limiter.wait().await;
        let resp = self.http.get(url).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(RegistryError::Status {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(stream_to_file(resp, dest, expected, on_progress).await?)
    }

    /// `POST /upload` with the archive as multipart field `package`.
    /// Requires `201 Created`.
    pub async fn upload(&self, repo: &Repository, archive: &Path) -> Result<(), RegistryError> {
        let file_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package".to_string());
        let bytes = tokio::fs::read(archive).await?;
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("package", part);

        let req = self.http.post(Self::api(&repo.url, "/upload")).multipart(form);
        let (status, env) = self
            .envelope(Self::authed(req, repo.auth_token.as_deref()))
            .await?;
        env.check()?;
        if status != StatusCode::CREATED {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                url: Self::api(&repo.url, "/upload"),
            });
        }
        Ok(())
    }

    /// `GET /`
    pub async fn server_info(&self, repo: &Repository) -> Result<ServerInfo, RegistryError> {
        self.call(self.http.get(Self::api(&repo.url, "/"))).await
    }

    /// `GET /stats`
    pub async fn stats(&self, repo: &Repository) -> Result<Statistics, RegistryError> {
        self.call(self.http.get(Self::api(&repo.url, "/stats"))).await
    }

    /// `POST /refresh`
    pub async fn refresh_index(&self, repo: &Repository) -> Result<(), RegistryError> {
        let req = self.http.post(Self::api(&repo.url, "/refresh"));
        let (status, env) = self
            .envelope(Self::authed(req, repo.auth_token.as_deref()))
            .await?;
        env.check()?;
        if !status.is_success() {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                url: Self::api(&repo.url, "/refresh"),
            });
        }
        Ok(())
    }

    /// Look a package up in one repository and pick a version and file.
    pub async fn resolve_in(
        &self,
        repo: &Repository,
        name: &str,
        version: Option<&str>,
        platform: &Platform,
    ) -> Result<ResolvedPackage, RegistryError> {
        let entry = self.find_package(repo, name).await?;
        let selected = entry
            .select_version(version)
            .cloned()
            .ok_or_else(|| RegistryError::VersionNotFound {
                name: name.to_string(),
                version: version.unwrap_or("latest").to_string(),
            })?;
        let file = selected
            .file_for(&platform.os, &platform.arch)
            .cloned()
            .ok_or_else(|| RegistryError::PlatformNotFound {
                name: name.to_string(),
                version: selected.version.to_string(),
                platform: platform.to_string(),
            })?;
        let download_url = Self::download_url(&repo.url, name, &selected.version, &file.filename);

        Ok(ResolvedPackage {
            repository: repo.clone(),
            entry,
            version: selected,
            file,
            download_url,
        })
    }

    /// Try repositories in the given order; the first success wins.
    pub async fn resolve(
        &self,
        repos: &[&Repository],
        name: &str,
        version: Option<&str>,
        platform: &Platform,
    ) -> Result<ResolvedPackage, RegistryError> {
        let mut reason = "no repositories configured".to_string();
        for repo in repos {
            match self.resolve_in(repo, name, version, platform).await {
                Ok(found) => {
                    debug!("Resolved {name} {} in {}", found.version.version, repo.name);
                    return Ok(found);
                }
                Err(e) => {
                    debug!("{name} not resolved in {}: {e}", repo.name);
                    reason = e.to_string();
                }
            }
        }
        Err(RegistryError::NotFound {
            name: name.to_string(),
            reason,
        })
    }
}
