mod codec;
mod codec_props;
