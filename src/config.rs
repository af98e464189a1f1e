#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Which persistence backend the stores are wired to.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Postgres { url: String },
    Memory,
}

/// Winner-rotation flavour. Direct assignment is always available to the
/// kuri admin; `Nominate` additionally enables the peer hand-off workflow,
/// and `Direct` deployments answer those endpoints with `policy_disabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPolicy {
    Direct,
    Nominate,
}

/// Member unique-code format: `#` + 6 uppercase base36 chars, or the
/// stricter 3-letters-3-digits variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeFormat {
    Alnum,
    LettersDigits,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub jwt: JwtConfig,
    pub rotation: RotationPolicy,
    pub code_format: CodeFormat,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match std::env::var("STORE")
            .unwrap_or_else(|_| "postgres".into())
            .as_str()
        {
            "postgres" => StoreConfig::Postgres {
                url: std::env::var("DATABASE_URL")?,
            },
            "memory" => StoreConfig::Memory,
            other => anyhow::bail!("unknown STORE backend: {other}"),
        };

        let rotation = match std::env::var("ROTATION_POLICY")
            .unwrap_or_else(|_| "nominate".into())
            .as_str()
        {
            "direct" => RotationPolicy::Direct,
            "nominate" => RotationPolicy::Nominate,
            other => anyhow::bail!("unknown ROTATION_POLICY: {other}"),
        };

        let code_format = match std::env::var("CODE_FORMAT")
            .unwrap_or_else(|_| "alnum".into())
            .as_str()
        {
            "alnum" => CodeFormat::Alnum,
            "letters-digits" => CodeFormat::LettersDigits,
            other => anyhow::bail!("unknown CODE_FORMAT: {other}"),
        };

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "kurifund".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "kurifund-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };

        Ok(Self {
            store,
            jwt,
            rotation,
            code_format,
        })
    }
}
